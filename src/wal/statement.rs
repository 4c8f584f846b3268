//! Logged statements
//!
//! Each mutating statement is logged in its final form: inserts carry the
//! full documents with their identifiers, deletes carry the identifiers
//! actually removed. Replay therefore never re-evaluates predicates or
//! parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentId};
use crate::storage::CollectionName;

/// Statement type tag stored in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StatementType {
    CreateCollection = 1,
    DropCollection = 2,
    InsertMany = 3,
    DeleteMany = 4,
    CreateIndex = 5,
    DropIndex = 6,
}

impl StatementType {
    /// Convert from u8, returns None for unknown tags
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(StatementType::CreateCollection),
            2 => Some(StatementType::DropCollection),
            3 => Some(StatementType::InsertMany),
            4 => Some(StatementType::DeleteMany),
            5 => Some(StatementType::CreateIndex),
            6 => Some(StatementType::DropIndex),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementType::CreateCollection => "create_collection",
            StatementType::DropCollection => "drop_collection",
            StatementType::InsertMany => "insert_many",
            StatementType::DeleteMany => "delete_many",
            StatementType::CreateIndex => "create_index",
            StatementType::DropIndex => "drop_index",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutating statement as recorded in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    CreateCollection {
        collection: CollectionName,
    },
    DropCollection {
        collection: CollectionName,
    },
    InsertMany {
        collection: CollectionName,
        documents: Vec<Document>,
    },
    DeleteMany {
        collection: CollectionName,
        ids: Vec<DocumentId>,
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

impl Statement {
    pub fn statement_type(&self) -> StatementType {
        match self {
            Statement::CreateCollection { .. } => StatementType::CreateCollection,
            Statement::DropCollection { .. } => StatementType::DropCollection,
            Statement::InsertMany { .. } => StatementType::InsertMany,
            Statement::DeleteMany { .. } => StatementType::DeleteMany,
            Statement::CreateIndex { .. } => StatementType::CreateIndex,
            Statement::DropIndex { .. } => StatementType::DropIndex,
        }
    }

    /// Collection the statement applies to
    pub fn collection(&self) -> &CollectionName {
        match self {
            Statement::CreateCollection { collection }
            | Statement::DropCollection { collection }
            | Statement::InsertMany { collection, .. }
            | Statement::DeleteMany { collection, .. }
            | Statement::CreateIndex { collection, .. }
            | Statement::DropIndex { collection, .. } => collection,
        }
    }
}
