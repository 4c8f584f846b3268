//! Operator outputs and scan limits

use serde::{Deserialize, Serialize};

use crate::document::{DocumentId, DocumentRef};

/// Materialized read-path output: shared document references.
///
/// Every per-query allocation hangs off the references held here; they are
/// released together when the plan is dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorData {
    documents: Vec<DocumentRef>,
}

impl OperatorData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            documents: Vec::with_capacity(capacity),
        }
    }

    pub fn from_documents(documents: Vec<DocumentRef>) -> Self {
        Self { documents }
    }

    pub fn append(&mut self, document: DocumentRef) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[DocumentRef] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut Vec<DocumentRef> {
        &mut self.documents
    }

    pub fn into_documents(self) -> Vec<DocumentRef> {
        self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Materialized write-path output: identifiers inserted or removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorWriteData {
    ids: Vec<DocumentId>,
}

impl OperatorWriteData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, id: DocumentId) {
        self.ids.push(id);
    }

    pub fn ids(&self) -> &[DocumentId] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<DocumentId> {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Result-count limit; `None` is unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Limit(Option<usize>);

impl Limit {
    pub fn unlimited() -> Self {
        Self(None)
    }

    pub fn limit(n: usize) -> Self {
        Self(Some(n))
    }

    /// Whether scanning should continue after `count` results
    pub fn check(&self, count: usize) -> bool {
        match self.0 {
            Some(n) => count < n,
            None => true,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Some(0)
    }

    pub fn value(&self) -> Option<usize> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_check() {
        assert!(Limit::unlimited().check(usize::MAX - 1));
        let limit = Limit::limit(2);
        assert!(limit.check(0));
        assert!(limit.check(1));
        assert!(!limit.check(2));
        assert!(!Limit::limit(0).check(0));
        assert!(Limit::limit(0).is_zero());
    }

    #[test]
    fn test_limit_serde_transparent() {
        assert_eq!(serde_json::to_string(&Limit::limit(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Limit::unlimited()).unwrap(), "null");
    }
}
