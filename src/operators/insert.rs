//! Insert operator
//!
//! Logs the batch, then stores and indexes each document. Uniqueness is
//! the job of a preceding primary-key guard; insert overwrites.

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
    let mut output = OperatorData::with_capacity(input.len());
    let mut write_data = OperatorWriteData::new();
    if input.is_empty() {
        return Ok((output, write_data));
    }

    let statement = Statement::InsertMany {
        collection: scope.collection.name().clone(),
        documents: input.documents().iter().map(|doc| (**doc).clone()).collect(),
    };
    let lsn = scope.wal.append(&statement).map_err(ExecutorError::wal_append)?;

    let (store, indexes) = scope.collection.parts_mut();
    for doc in input.into_documents() {
        let id = doc.id();
        if let Some(previous) = store.insert_or_assign(id, doc.clone()) {
            indexes.delete_document(&previous);
        }
        indexes.insert_document(&doc, pipeline);
        output.append(doc);
        write_data.append(id);
    }

    debug!(
        session = %pipeline.session,
        lsn,
        inserted = write_data.len(),
        "documents inserted"
    );
    Ok((output, write_data))
}
