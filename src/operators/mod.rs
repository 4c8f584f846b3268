//! Physical operators for collectiondb
//!
//! # Design Principles
//!
//! - Closed set of operator kinds, dispatched by `match`
//! - Single pass, fully materialized, depth-first execution
//! - Log first: mutations append to the WAL before touching the store
//! - No locks: the owning context serializes executions

mod aggregate;
mod data;
mod delete;
mod errors;
mod executor;
mod insert;
mod operator;
mod scan;
mod sort;

pub use aggregate::AggregateKind;
pub use data::{Limit, OperatorData, OperatorWriteData};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use executor::{ExecutionOutput, QueryExecutor};
pub use operator::{ExecutionScope, Operator, OperatorKind};
pub use scan::PrimaryKeyMode;
