//! Predicate trees and their evaluation
//!
//! Plans carry [`Expr`] trees whose operands may reference statement
//! parameters. Operators bind them once per execution into a
//! [`BoundPredicate`] and evaluate that per document.

mod evaluate;
mod expr;

pub use evaluate::BoundPredicate;
pub use expr::{CompareOp, Expr, Operand};
