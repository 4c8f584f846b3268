//! In-memory collection store
//!
//! An ordered map from document identifier to document. Full iteration is
//! in identifier order, which is therefore the order full scans observe.

use std::collections::btree_map::{self, BTreeMap};

use crate::document::{DocumentId, DocumentRef};

/// Ordered document store owned by exactly one collection context
#[derive(Debug, Clone, Default)]
pub struct CollectionStore {
    documents: BTreeMap<DocumentId, DocumentRef>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the document stored under `id`.
    ///
    /// Returns the replaced document, if any.
    pub fn insert_or_assign(&mut self, id: DocumentId, document: DocumentRef) -> Option<DocumentRef> {
        self.documents.insert(id, document)
    }

    pub fn find(&self, id: &DocumentId) -> Option<&DocumentRef> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    /// Removes the document stored under `id`, returning it
    pub fn erase(&mut self, id: &DocumentId) -> Option<DocumentRef> {
        self.documents.remove(id)
    }

    /// Iterates `(id, document)` pairs in identifier order
    pub fn iter(&self) -> btree_map::Iter<'_, DocumentId, DocumentRef> {
        self.documents.iter()
    }

    /// Iterates documents in identifier order
    pub fn values(&self) -> btree_map::Values<'_, DocumentId, DocumentRef> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
