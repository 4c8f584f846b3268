//! Aggregate kinds
//!
//! Each kind computes one scalar over its input, names the result field it
//! is stored under, and combines per-shard partials into the final value.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::document::{compare_values, Document, DocumentId, DocumentRef};

use super::data::OperatorData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum { field: String },
    Min { field: String },
    Max { field: String },
}

impl AggregateKind {
    /// Result field name
    pub fn key(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum { .. } => "sum",
            AggregateKind::Min { .. } => "min",
            AggregateKind::Max { .. } => "max",
        }
    }

    /// Computes the aggregate over a child's output; a null child is an
    /// empty input.
    pub fn compute(&self, input: Option<&OperatorData>) -> Value {
        let docs = input.map(|data| data.documents()).unwrap_or(&[]);
        match self {
            AggregateKind::Count => Value::from(docs.len()),
            AggregateKind::Sum { field } => {
                sum(docs.iter().filter_map(|doc| doc.get_path(field)))
            }
            AggregateKind::Min { field } => {
                extreme(docs.iter().filter_map(|doc| doc.get_path(field)), Ordering::Less)
            }
            AggregateKind::Max { field } => {
                extreme(docs.iter().filter_map(|doc| doc.get_path(field)), Ordering::Greater)
            }
        }
    }

    /// Merges per-shard results of this kind.
    pub fn combine(&self, partials: &[Value]) -> Value {
        match self {
            AggregateKind::Count | AggregateKind::Sum { .. } => sum(partials.iter()),
            AggregateKind::Min { .. } => extreme(partials.iter(), Ordering::Less),
            AggregateKind::Max { .. } => extreme(partials.iter(), Ordering::Greater),
        }
    }

    /// Wraps a value as the single result document
    pub fn result_document(&self, value: Value) -> DocumentRef {
        let mut fields = Map::new();
        fields.insert(self.key().to_string(), value);
        Document::from_fields(DocumentId::generate(), fields).into_ref()
    }

    /// Reads this kind's value back out of a result document
    pub fn result_value(&self, document: &Document) -> Value {
        document.get(self.key()).cloned().unwrap_or(Value::Null)
    }
}

enum Accumulator {
    Int(i64),
    Float(f64),
}

impl Accumulator {
    fn add(self, n: &Number) -> Self {
        match (self, n.as_i64()) {
            (Accumulator::Int(acc), Some(x)) => match acc.checked_add(x) {
                Some(total) => Accumulator::Int(total),
                None => Accumulator::Float(acc as f64 + x as f64),
            },
            (Accumulator::Int(acc), None) => Accumulator::Float(acc as f64 + n.as_f64().unwrap_or(0.0)),
            (Accumulator::Float(acc), _) => Accumulator::Float(acc + n.as_f64().unwrap_or(0.0)),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Accumulator::Int(total) => Value::from(total),
            Accumulator::Float(total) => Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

/// Sum of the numeric values; non-numbers are ignored
fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    values
        .filter_map(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        })
        .fold(Accumulator::Int(0), Accumulator::add)
        .into_value()
}

/// Smallest (`Less`) or largest (`Greater`) non-null value, null if none
fn extreme<'a>(values: impl Iterator<Item = &'a Value>, wanted: Ordering) -> Value {
    values
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare_values(v, b) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}
