//! Delete operator
//!
//! Logs the identifiers that will be removed, then erases them from the
//! store and the indexes. Output echoes the removed documents.

use std::collections::BTreeSet;

use tracing::debug;

use crate::context::PipelineContext;
use crate::wal::Statement;

use super::data::{OperatorData, OperatorWriteData};
use super::errors::{ExecutorError, ExecutorResult};
use super::operator::ExecutionScope;

pub(crate) fn execute(
    scope: &mut ExecutionScope<'_>,
    pipeline: &PipelineContext,
    input: OperatorData,
) -> ExecutorResult<(OperatorData, OperatorWriteData)> {
    let mut seen = BTreeSet::new();
    let ids: Vec<_> = input
        .documents()
        .iter()
        .map(|doc| doc.id())
        .filter(|id| scope.collection.store().contains(id) && seen.insert(*id))
        .collect();

    let mut output = OperatorData::with_capacity(ids.len());
    let mut write_data = OperatorWriteData::new();
    if ids.is_empty() {
        return Ok((output, write_data));
    }

    let statement = Statement::DeleteMany {
        collection: scope.collection.name().clone(),
        ids: ids.clone(),
    };
    let lsn = scope.wal.append(&statement).map_err(ExecutorError::wal_append)?;

    let (store, indexes) = scope.collection.parts_mut();
    for id in ids {
        if let Some(removed) = store.erase(&id) {
            indexes.delete_document(&removed);
            output.append(removed);
            write_data.append(id);
        }
    }

    debug!(
        session = %pipeline.session,
        lsn,
        deleted = write_data.len(),
        "documents deleted"
    );
    Ok((output, write_data))
}
