//! Operator tree and execution protocol
//!
//! Each operator has at most one input ("left") operator, so a plan is a
//! chain. Execution is depth-first and single pass: an operator runs its
//! child to completion, takes the child's output, and fully materializes
//! its own. There is no pull-based iteration and no re-execution.
//!
//! # Families
//!
//! - Read-only (scans, sort, limit, aggregate) produce [`OperatorData`]
//!   and never mutate the store
//! - Read-write (insert, delete) also produce [`OperatorWriteData`] and
//!   append a statement to the WAL before mutating
//!
//! A null child output is "no input rows" for read-write operators and
//! aggregates. A primary-key guard that finds a collision leaves its
//! output null and records the colliding identifier.

use serde_json::Value;
use tracing::debug;

use crate::context::PipelineContext;
use crate::document::{Comparator, DocumentId, DocumentRef};
use crate::predicate::{BoundPredicate, Expr, Operand};
use crate::storage::CollectionContext;
use crate::wal::WalSink;

use super::aggregate::AggregateKind;
use super::data::{Limit, OperatorData, OperatorWriteData};
use super::errors::{ExecutorError, ExecutorResult};
use super::scan::{self, PrimaryKeyMode};
use super::{delete, insert, sort};

/// Collection and log an operator tree executes against.
///
/// Borrowed for one execution turn of the owning context.
pub struct ExecutionScope<'a> {
    pub collection: &'a mut CollectionContext,
    pub wal: &'a mut dyn WalSink,
}

impl<'a> ExecutionScope<'a> {
    pub fn new(collection: &'a mut CollectionContext, wal: &'a mut dyn WalSink) -> Self {
        Self { collection, wal }
    }
}

/// Kind-specific part of an operator
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorKind {
    /// Literal document list
    RawData(Vec<DocumentRef>),
    /// Predicate scan over the whole store
    FullScan { predicate: Expr, limit: Limit },
    /// Identifier lookups; see [`PrimaryKeyMode`]
    PrimaryKeyScan(PrimaryKeyMode),
    /// Unfiltered scan over the whole store
    TransferScan { limit: Limit },
    /// Secondary-index equality lookup plus residual predicate
    IndexScan {
        index: String,
        value: Operand,
        predicate: Expr,
        limit: Limit,
    },
    Insert,
    Delete,
    Sort(Comparator),
    /// Keeps the first `n` input documents
    Limit(Limit),
    Aggregate(AggregateKind),
}

impl OperatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::RawData(_) => "raw_data",
            OperatorKind::FullScan { .. } => "full_scan",
            OperatorKind::PrimaryKeyScan(_) => "primary_key_scan",
            OperatorKind::TransferScan { .. } => "transfer_scan",
            OperatorKind::IndexScan { .. } => "index_scan",
            OperatorKind::Insert => "insert",
            OperatorKind::Delete => "delete",
            OperatorKind::Sort(_) => "sort",
            OperatorKind::Limit(_) => "limit",
            OperatorKind::Aggregate(_) => "aggregate",
        }
    }

    /// Whether the kind may mutate the store
    pub fn is_read_write(&self) -> bool {
        matches!(self, OperatorKind::Insert | OperatorKind::Delete)
    }
}

/// One node of a physical plan
#[derive(Debug, Clone)]
pub struct Operator {
    kind: OperatorKind,
    left: Option<Box<Operator>>,
    output: Option<OperatorData>,
    write_data: Option<OperatorWriteData>,
    key_collision: Option<DocumentId>,
    scanned: usize,
    executed: bool,
}

impl Operator {
    pub fn new(kind: OperatorKind) -> Self {
        Self {
            kind,
            left: None,
            output: None,
            write_data: None,
            key_collision: None,
            scanned: 0,
            executed: false,
        }
    }

    /// Operator fed by `left`
    pub fn with_left(kind: OperatorKind, left: Operator) -> Self {
        let mut operator = Self::new(kind);
        operator.left = Some(Box::new(left));
        operator
    }

    pub fn set_left(&mut self, left: Operator) {
        self.left = Some(Box::new(left));
    }

    pub fn kind(&self) -> &OperatorKind {
        &self.kind
    }

    pub fn left(&self) -> Option<&Operator> {
        self.left.as_deref()
    }

    /// Output, null until executed (and null after a guard collision)
    pub fn output(&self) -> Option<&OperatorData> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<OperatorData> {
        self.output.take()
    }

    /// Identifiers touched by a read-write operator
    pub fn write_data(&self) -> Option<&OperatorWriteData> {
        self.write_data.as_ref()
    }

    pub fn take_write_data(&mut self) -> Option<OperatorWriteData> {
        self.write_data.take()
    }

    /// Identifier a primary-key guard in this chain rejected
    pub fn key_collision(&self) -> Option<DocumentId> {
        self.key_collision
            .or_else(|| self.left.as_ref().and_then(|left| left.key_collision()))
    }

    /// Documents this operator examined in the store
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Operator names from this node down to the leaf
    pub fn chain(&self) -> Vec<&'static str> {
        let mut names = vec![self.kind.name()];
        let mut current = self.left();
        while let Some(op) = current {
            names.push(op.kind.name());
            current = op.left();
        }
        names
    }

    /// Executes the subtree rooted here.
    ///
    /// # Errors
    ///
    /// - `EXEC_INVALID_PLAN` on re-execution or a misplaced leaf
    /// - `EXEC_UNBOUND_PARAMETER` if a predicate references a missing parameter
    /// - `EXEC_WAL_APPEND` if a mutation could not be logged
    pub fn on_execute(
        &mut self,
        scope: &mut ExecutionScope<'_>,
        pipeline: &PipelineContext,
    ) -> ExecutorResult<()> {
        if self.executed {
            return Err(ExecutorError::invalid_plan(format!(
                "{} operator executed twice",
                self.kind.name()
            )));
        }
        self.executed = true;

        if matches!(self.kind, OperatorKind::Aggregate(_)) && self.left.is_none() {
            self.set_left(Operator::new(OperatorKind::TransferScan {
                limit: Limit::unlimited(),
            }));
        }

        let input = match self.left.as_deref_mut() {
            Some(left) => {
                left.on_execute(scope, pipeline)?;
                left.take_output()
            }
            None => None,
        };

        match &self.kind {
            OperatorKind::RawData(documents) => {
                self.output = Some(scan::raw_data(documents));
            }
            OperatorKind::FullScan { predicate, limit } => {
                let predicate = BoundPredicate::bind(predicate, &pipeline.parameters)?;
                self.output = Some(scan::full_scan(
                    scope.collection.store(),
                    &predicate,
                    *limit,
                    &mut self.scanned,
                ));
            }
            OperatorKind::TransferScan { limit } => {
                self.output = Some(scan::transfer_scan(
                    scope.collection.store(),
                    *limit,
                    &mut self.scanned,
                ));
            }
            OperatorKind::IndexScan {
                index,
                value,
                predicate,
                limit,
            } => {
                let value: Value = value.resolve(&pipeline.parameters)?.clone();
                let predicate = BoundPredicate::bind(predicate, &pipeline.parameters)?;
                self.output = Some(scan::index_scan(
                    scope.collection,
                    index,
                    &value,
                    &predicate,
                    *limit,
                    &mut self.scanned,
                )?);
            }
            OperatorKind::PrimaryKeyScan(PrimaryKeyMode::Fetch(ids)) => {
                self.output = Some(scan::fetch(scope.collection.store(), ids, &mut self.scanned));
            }
            OperatorKind::PrimaryKeyScan(PrimaryKeyMode::RejectExisting) => {
                let Some(input) = input else {
                    return Err(ExecutorError::invalid_plan(
                        "primary key guard requires an input operator",
                    ));
                };
                self.scanned = input.len();
                match scan::reject_existing(scope.collection.store(), input) {
                    Ok(accepted) => self.output = Some(accepted),
                    Err(id) => {
                        debug!(
                            session = %pipeline.session,
                            collection = %scope.collection.name(),
                            id = %id,
                            "duplicate key rejected"
                        );
                        self.key_collision = Some(id);
                    }
                }
            }
            OperatorKind::Insert => {
                let write_data = match input {
                    Some(input) => {
                        let (output, write_data) = insert::execute(scope, pipeline, input)?;
                        self.output = Some(output);
                        write_data
                    }
                    None => OperatorWriteData::new(),
                };
                self.write_data = Some(write_data);
            }
            OperatorKind::Delete => {
                let write_data = match input {
                    Some(input) => {
                        let (output, write_data) = delete::execute(scope, pipeline, input)?;
                        self.output = Some(output);
                        write_data
                    }
                    None => {
                        self.output = Some(OperatorData::new());
                        OperatorWriteData::new()
                    }
                };
                self.write_data = Some(write_data);
            }
            OperatorKind::Sort(comparator) => {
                self.output = input.map(|input| sort::execute(comparator, input));
            }
            OperatorKind::Limit(limit) => {
                self.output = input.map(|input| {
                    let mut documents = input.into_documents();
                    if let Some(n) = limit.value() {
                        documents.truncate(n);
                    }
                    OperatorData::from_documents(documents)
                });
            }
            OperatorKind::Aggregate(kind) => {
                let value = kind.compute(input.as_ref());
                let mut output = OperatorData::with_capacity(1);
                output.append(kind.result_document(value));
                self.output = Some(output);
            }
        }

        Ok(())
    }
}
