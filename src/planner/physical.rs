//! Physical planner
//!
//! Walks a logical node and instantiates the operator chain bound to one
//! collection context.
//!
//! Plan shapes:
//! - match: index scan on an indexed equality, else full scan
//! - insert: raw data -> primary-key guard -> insert
//! - delete: full scan -> delete
//! - delete by ids: primary-key fetch -> delete
//! - fetch by ids: primary-key fetch
//! - aggregate: (match | transfer scan) -> sort* / limit* -> group?

use crate::document::Comparator;
use crate::operators::{ExecutorError, ExecutorResult, Limit, Operator, OperatorKind, PrimaryKeyMode};
use crate::predicate::{Expr, Operand};
use crate::storage::CollectionContext;

use super::logical::{Node, Stage};

/// Builds the operator tree for `node` against `collection`.
///
/// # Errors
///
/// Returns `EXEC_INVALID_PLAN` for DDL nodes (they change the catalog and
/// have no operator tree) and for malformed aggregate pipelines.
pub fn create_plan(node: &Node, collection: &CollectionContext) -> ExecutorResult<Operator> {
    match node {
        Node::Match {
            predicate, limit, ..
        } => Ok(scan_for(predicate, *limit, collection)),
        Node::Insert { documents, .. } => {
            let raw = Operator::new(OperatorKind::RawData(
                documents.iter().cloned().map(|doc| doc.into_ref()).collect(),
            ));
            let guard = Operator::with_left(
                OperatorKind::PrimaryKeyScan(PrimaryKeyMode::RejectExisting),
                raw,
            );
            Ok(Operator::with_left(OperatorKind::Insert, guard))
        }
        Node::Delete {
            predicate, limit, ..
        } => Ok(Operator::with_left(
            OperatorKind::Delete,
            scan_for(predicate, *limit, collection),
        )),
        Node::DeleteByIds { ids, .. } => Ok(Operator::with_left(
            OperatorKind::Delete,
            Operator::new(OperatorKind::PrimaryKeyScan(PrimaryKeyMode::Fetch(ids.clone()))),
        )),
        Node::FetchByIds { ids, .. } => Ok(Operator::new(OperatorKind::PrimaryKeyScan(
            PrimaryKeyMode::Fetch(ids.clone()),
        ))),
        Node::Aggregate { stages, .. } => aggregate_plan(stages, collection),
        Node::CreateCollection { .. }
        | Node::DropCollection { .. }
        | Node::CreateIndex { .. }
        | Node::DropIndex { .. } => Err(ExecutorError::invalid_plan(
            "DDL statements have no operator plan",
        )),
    }
}

fn scan_for(predicate: &Expr, limit: Limit, collection: &CollectionContext) -> Operator {
    match indexed_equality(predicate, collection) {
        Some((index, value)) => Operator::new(OperatorKind::IndexScan {
            index,
            value,
            predicate: predicate.clone(),
            limit,
        }),
        None => Operator::new(OperatorKind::FullScan {
            predicate: predicate.clone(),
            limit,
        }),
    }
}

/// First equality (top level, or a direct child of a top-level `and`) on a
/// field some index covers
fn indexed_equality(predicate: &Expr, collection: &CollectionContext) -> Option<(String, Operand)> {
    let candidates: Vec<&Expr> = match predicate {
        Expr::And { children } => children.iter().collect(),
        other => vec![other],
    };
    candidates.into_iter().find_map(|expr| {
        let (field, operand) = expr.as_equality()?;
        let index = collection.indexes().index_on(field)?;
        Some((index.to_string(), operand.clone()))
    })
}

fn aggregate_plan(stages: &[Stage], collection: &CollectionContext) -> ExecutorResult<Operator> {
    let mut rest = stages;
    let mut plan = match rest.first() {
        Some(Stage::Match { predicate }) => {
            rest = &rest[1..];
            scan_for(predicate, Limit::unlimited(), collection)
        }
        _ => Operator::new(OperatorKind::TransferScan {
            limit: Limit::unlimited(),
        }),
    };

    for (position, stage) in rest.iter().enumerate() {
        let kind = match stage {
            Stage::Match { .. } => {
                return Err(ExecutorError::invalid_plan(
                    "match is only allowed as the first aggregate stage",
                ))
            }
            Stage::Sort { keys } => OperatorKind::Sort(Comparator::new(keys.clone())),
            Stage::Limit { limit } => OperatorKind::Limit(*limit),
            Stage::Group { aggregate } => {
                if position + 1 != rest.len() {
                    return Err(ExecutorError::invalid_plan(
                        "group must be the last aggregate stage",
                    ));
                }
                OperatorKind::Aggregate(aggregate.clone())
            }
        };
        plan = Operator::with_left(kind, plan);
    }

    Ok(plan)
}
