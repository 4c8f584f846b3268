//! Predicate evaluation
//!
//! Evaluates bound predicate trees strictly:
//! - Missing field paths make the comparison false (including `ne`)
//! - No type coercion: values of different types are never equal, never
//!   ordered, and always `ne`
//! - An empty `and` is true, an empty `or` is false

use std::cmp::Ordering;

use serde_json::Value;

use crate::context::StorageParameters;
use crate::document::{compare_values, same_type, Document};
use crate::operators::ExecutorResult;

use super::expr::{CompareOp, Expr};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Node>),
    Or(Vec<Node>),
    All,
}

/// A predicate with every parameter resolved, ready to evaluate
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPredicate {
    root: Node,
}

impl BoundPredicate {
    /// Binds `expr` against `params`, failing on any unbound parameter.
    pub fn bind(expr: &Expr, params: &StorageParameters) -> ExecutorResult<Self> {
        Ok(Self {
            root: Self::lower(expr, params)?,
        })
    }

    /// Predicate matching every document
    pub fn all() -> Self {
        Self { root: Node::All }
    }

    fn lower(expr: &Expr, params: &StorageParameters) -> ExecutorResult<Node> {
        Ok(match expr {
            Expr::Compare { field, op, operand } => Node::Compare {
                field: field.clone(),
                op: *op,
                value: operand.resolve(params)?.clone(),
            },
            Expr::And { children } => Node::And(
                children
                    .iter()
                    .map(|c| Self::lower(c, params))
                    .collect::<ExecutorResult<_>>()?,
            ),
            Expr::Or { children } => Node::Or(
                children
                    .iter()
                    .map(|c| Self::lower(c, params))
                    .collect::<ExecutorResult<_>>()?,
            ),
            Expr::All => Node::All,
        })
    }

    /// True if this predicate matches every document
    pub fn is_all(&self) -> bool {
        self.root == Node::All
    }

    /// Checks if a document matches
    pub fn matches(&self, document: &Document) -> bool {
        eval(&self.root, document)
    }
}

fn eval(node: &Node, document: &Document) -> bool {
    match node {
        Node::Compare { field, op, value } => match document.get_path(field) {
            Some(actual) => compare_match(actual, *op, value),
            None => false,
        },
        Node::And(children) => children.iter().all(|c| eval(c, document)),
        Node::Or(children) => children.iter().any(|c| eval(c, document)),
        Node::All => true,
    }
}

fn compare_match(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    if !same_type(actual, expected) {
        return op == CompareOp::Ne;
    }
    let ord = compare_values(actual, expected);
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Gte => ord != Ordering::Less,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
    }
}
