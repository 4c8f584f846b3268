//! Logical plan nodes
//!
//! One tagged node per statement kind, carrying exactly the fields the
//! corresponding operators need. Produced by a front end; consumed by the
//! physical planner, the dispatcher, and recovery.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, DocumentId, DocumentResult, SortKey};
use crate::operators::{AggregateKind, Limit};
use crate::predicate::Expr;
use crate::storage::CollectionName;

/// Stage of an aggregate pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Filter; only valid as the first stage
    Match { predicate: Expr },
    Sort { keys: Vec<SortKey> },
    Limit { limit: Limit },
    /// Reduce to one document; only valid as the last stage
    Group { aggregate: AggregateKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Match {
        collection: CollectionName,
        predicate: Expr,
        #[serde(default)]
        limit: Limit,
    },
    Insert {
        collection: CollectionName,
        documents: Vec<Document>,
    },
    Delete {
        collection: CollectionName,
        predicate: Expr,
        #[serde(default)]
        limit: Limit,
    },
    DeleteByIds {
        collection: CollectionName,
        ids: Vec<DocumentId>,
    },
    FetchByIds {
        collection: CollectionName,
        ids: Vec<DocumentId>,
    },
    Aggregate {
        collection: CollectionName,
        stages: Vec<Stage>,
    },
    CreateCollection {
        collection: CollectionName,
    },
    DropCollection {
        collection: CollectionName,
    },
    CreateIndex {
        collection: CollectionName,
        name: String,
        field: String,
    },
    DropIndex {
        collection: CollectionName,
        name: String,
    },
}

impl Node {
    /// Insert node over raw bodies; bodies without `_id` get a fresh one.
    pub fn insert(collection: CollectionName, bodies: Vec<Value>) -> DocumentResult<Self> {
        let documents = bodies
            .into_iter()
            .map(Document::with_generated_id)
            .collect::<DocumentResult<Vec<_>>>()?;
        Ok(Node::Insert {
            collection,
            documents,
        })
    }

    pub fn find(collection: CollectionName, predicate: Expr) -> Self {
        Node::Match {
            collection,
            predicate,
            limit: Limit::unlimited(),
        }
    }

    pub fn collection(&self) -> &CollectionName {
        match self {
            Node::Match { collection, .. }
            | Node::Insert { collection, .. }
            | Node::Delete { collection, .. }
            | Node::DeleteByIds { collection, .. }
            | Node::FetchByIds { collection, .. }
            | Node::Aggregate { collection, .. }
            | Node::CreateCollection { collection }
            | Node::DropCollection { collection }
            | Node::CreateIndex { collection, .. }
            | Node::DropIndex { collection, .. } => collection,
        }
    }

    /// Whether the node changes the catalog rather than running operators
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Node::CreateCollection { .. }
                | Node::DropCollection { .. }
                | Node::CreateIndex { .. }
                | Node::DropIndex { .. }
        )
    }

    /// The group stage of an aggregate pipeline, if any
    pub fn group(&self) -> Option<&AggregateKind> {
        match self {
            Node::Aggregate { stages, .. } => stages.iter().find_map(|stage| match stage {
                Stage::Group { aggregate } => Some(aggregate),
                _ => None,
            }),
            _ => None,
        }
    }
}
