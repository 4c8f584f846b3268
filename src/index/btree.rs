//! Ordered index structures
//!
//! Keys are JSON values ordered by the shared value comparator, so index
//! range order agrees with sort and predicate order. Identifier sets are
//! `BTreeSet`s, keeping lookups deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::document::{compare_values, DocumentId};

/// Index key wrapping a field value
#[derive(Debug, Clone)]
pub struct IndexKey(Value);

impl IndexKey {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(&self.0, &other.0)
    }
}

/// Key -> document identifiers
#[derive(Debug, Clone, Default)]
pub struct IndexTree {
    entries: BTreeMap<IndexKey, BTreeSet<DocumentId>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: IndexKey, id: DocumentId) {
        self.entries.entry(key).or_default().insert(id);
    }

    /// Removes one identifier; drops the key once its set is empty
    pub fn remove(&mut self, key: &IndexKey, id: &DocumentId) {
        if let Some(ids) = self.entries.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// Identifiers stored under `key`, ascending
    pub fn lookup_eq(&self, key: &IndexKey) -> Vec<DocumentId> {
        self.entries
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_keys_unify_int_and_float() {
        let mut tree = IndexTree::new();
        let id = DocumentId::from_parts(1, 1);
        tree.insert(IndexKey::new(json!(3)), id);
        assert_eq!(tree.lookup_eq(&IndexKey::new(json!(3.0))), vec![id]);
    }

    #[test]
    fn test_remove_drops_empty_key() {
        let mut tree = IndexTree::new();
        let a = DocumentId::from_parts(1, 1);
        let b = DocumentId::from_parts(1, 2);
        tree.insert(IndexKey::new(json!("x")), a);
        tree.insert(IndexKey::new(json!("x")), b);
        tree.remove(&IndexKey::new(json!("x")), &a);
        assert_eq!(tree.lookup_eq(&IndexKey::new(json!("x"))), vec![b]);
        tree.remove(&IndexKey::new(json!("x")), &b);
        assert_eq!(tree.key_count(), 0);
    }
}
