//! Query executor
//!
//! Runs one physical plan against one collection context to completion and
//! turns the root operator's outputs into the caller-visible result:
//! 1. Execute the tree depth-first
//! 2. Surface a primary-key guard collision as a duplicate-key error
//! 3. Return the root's documents and affected identifiers

use crate::context::PipelineContext;
use crate::document::{DocumentId, DocumentRef};
use crate::storage::CollectionContext;
use crate::wal::WalSink;

use super::errors::{ExecutorError, ExecutorResult};
use super::operator::{ExecutionScope, Operator};

/// Materialized result of one plan execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    /// Root operator output (echoed rows for mutations)
    pub documents: Vec<DocumentRef>,
    /// Identifiers inserted or removed
    pub written: Vec<DocumentId>,
}

/// Executes plans inside the owning context's execution turn
pub struct QueryExecutor<'a> {
    collection: &'a mut CollectionContext,
    wal: &'a mut dyn WalSink,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(collection: &'a mut CollectionContext, wal: &'a mut dyn WalSink) -> Self {
        Self { collection, wal }
    }

    /// Executes `plan` and returns its results.
    ///
    /// # Errors
    ///
    /// Returns `EXEC_DUPLICATE_KEY` if a uniqueness guard nulled the
    /// batch, or any error raised by an operator.
    pub fn execute(&mut self, mut plan: Operator, pipeline: &PipelineContext) -> ExecutorResult<ExecutionOutput> {
        {
            let mut scope = ExecutionScope::new(self.collection, self.wal);
            plan.on_execute(&mut scope, pipeline)?;
        }

        let written = plan
            .take_write_data()
            .map(|write_data| write_data.into_ids())
            .unwrap_or_default();

        match plan.take_output() {
            Some(output) => Ok(ExecutionOutput {
                documents: output.into_documents(),
                written,
            }),
            None => match plan.key_collision() {
                Some(id) => Err(ExecutorError::duplicate_key(id)),
                None => Ok(ExecutionOutput {
                    documents: Vec::new(),
                    written,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::operators::{ExecutorErrorCode, Limit, OperatorKind, PrimaryKeyMode};
    use crate::storage::CollectionName;
    use crate::wal::DiscardWal;
    use serde_json::json;

    fn insert(ids: &[u32]) -> Operator {
        let documents = ids
            .iter()
            .map(|i| {
                Document::with_id(DocumentId::from_parts(3, *i), json!({}))
                    .unwrap()
                    .into_ref()
            })
            .collect();
        Operator::with_left(
            OperatorKind::Insert,
            Operator::with_left(
                OperatorKind::PrimaryKeyScan(PrimaryKeyMode::RejectExisting),
                Operator::new(OperatorKind::RawData(documents)),
            ),
        )
    }

    #[test]
    fn test_duplicate_key_surfaces_as_error() {
        let mut ctx = CollectionContext::new(CollectionName::new("db", "c"));
        let mut wal = DiscardWal;
        let pipeline = PipelineContext::detached();
        let mut executor = QueryExecutor::new(&mut ctx, &mut wal);

        let first = executor.execute(insert(&[1, 2]), &pipeline).unwrap();
        assert_eq!(first.written.len(), 2);

        let err = executor.execute(insert(&[3, 2]), &pipeline).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::DuplicateKey);
        assert_eq!(err.key(), Some(DocumentId::from_parts(3, 2)));

        let all = executor
            .execute(
                Operator::new(OperatorKind::TransferScan { limit: Limit::unlimited() }),
                &pipeline,
            )
            .unwrap();
        assert_eq!(all.documents.len(), 2);
        assert!(all.written.is_empty());
    }
}
