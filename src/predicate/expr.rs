//! Predicate expression trees as carried by logical plans
//!
//! Leaves compare a field path with an operand; operands are either
//! literals or references to bound statement parameters. Connectives
//! combine children.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{ParameterId, StorageParameters};
use crate::operators::{ExecutorError, ExecutorResult};

/// Comparison operator of a predicate leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Literal(Value),
    Parameter(ParameterId),
}

impl Operand {
    /// Resolves the operand against the parameter table
    pub fn resolve<'a>(&'a self, params: &'a StorageParameters) -> ExecutorResult<&'a Value> {
        match self {
            Operand::Literal(value) => Ok(value),
            Operand::Parameter(id) => params
                .get(*id)
                .ok_or_else(|| ExecutorError::unbound_parameter(*id)),
        }
    }
}

/// Predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
    },
    And {
        children: Vec<Expr>,
    },
    Or {
        children: Vec<Expr>,
    },
    /// Matches every document
    All,
}

impl Expr {
    pub fn compare(field: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Expr::Compare {
            field: field.into(),
            op,
            operand,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Eq, Operand::Literal(value))
    }

    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Ne, Operand::Literal(value))
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Gt, Operand::Literal(value))
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Gte, Operand::Literal(value))
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Lt, Operand::Literal(value))
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Lte, Operand::Literal(value))
    }

    /// Comparison against a bound parameter
    pub fn param(field: impl Into<String>, op: CompareOp, id: ParameterId) -> Self {
        Self::compare(field, op, Operand::Parameter(id))
    }

    pub fn and(children: Vec<Expr>) -> Self {
        Expr::And { children }
    }

    pub fn or(children: Vec<Expr>) -> Self {
        Expr::Or { children }
    }

    pub fn all() -> Self {
        Expr::All
    }

    /// Substitutes every parameter reference with its bound literal.
    pub fn bind(&self, params: &StorageParameters) -> ExecutorResult<Expr> {
        Ok(match self {
            Expr::Compare { field, op, operand } => Expr::Compare {
                field: field.clone(),
                op: *op,
                operand: Operand::Literal(operand.resolve(params)?.clone()),
            },
            Expr::And { children } => Expr::And {
                children: bind_all(children, params)?,
            },
            Expr::Or { children } => Expr::Or {
                children: bind_all(children, params)?,
            },
            Expr::All => Expr::All,
        })
    }

    /// Single-field equality with a literal or parameter operand, if that
    /// is the whole predicate
    pub fn as_equality(&self) -> Option<(&str, &Operand)> {
        match self {
            Expr::Compare {
                field,
                op: CompareOp::Eq,
                operand,
            } => Some((field, operand)),
            _ => None,
        }
    }
}

impl Default for Expr {
    fn default() -> Self {
        Expr::All
    }
}

fn bind_all(children: &[Expr], params: &StorageParameters) -> ExecutorResult<Vec<Expr>> {
    children.iter().map(|child| child.bind(params)).collect()
}
