//! Secondary index engine for one collection context
//!
//! # API
//!
//! - `create_index(name, field, store)` - Build a single-field index from the store
//! - `drop_index(name)` - Remove an index
//! - `insert_document(doc, pipeline)` - Index a newly stored document
//! - `delete_document(doc)` - Remove a document from every index
//! - `lookup_eq(name, value)` - Exact match lookup
//!
//! Documents missing the indexed field are not indexed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::context::PipelineContext;
use crate::document::{Document, DocumentId};
use crate::storage::CollectionStore;

use super::btree::{IndexKey, IndexTree};
use super::errors::{IndexError, IndexResult};

/// Name and field path of a secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub field: String,
}

#[derive(Debug, Clone)]
struct SingleFieldIndex {
    field: String,
    tree: IndexTree,
}

impl SingleFieldIndex {
    fn insert(&mut self, doc: &Document) {
        if let Some(value) = doc.get_path(&self.field) {
            self.tree.insert(IndexKey::new(value.clone()), doc.id());
        }
    }

    fn remove(&mut self, doc: &Document) {
        if let Some(value) = doc.get_path(&self.field) {
            self.tree.remove(&IndexKey::new(value.clone()), &doc.id());
        }
    }
}

/// Secondary indexes of one collection context, keyed by index name
#[derive(Debug, Clone, Default)]
pub struct IndexEngine {
    indexes: BTreeMap<String, SingleFieldIndex>,
}

impl IndexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index over `field` and populates it from `store`.
    pub fn create_index(
        &mut self,
        name: impl Into<String>,
        field: impl Into<String>,
        store: &CollectionStore,
    ) -> IndexResult<()> {
        let name = name.into();
        let field = field.into();

        if field.is_empty() {
            return Err(IndexError::EmptyField);
        }
        if self.indexes.contains_key(&name) {
            return Err(IndexError::AlreadyExists(name));
        }

        let mut index = SingleFieldIndex {
            field,
            tree: IndexTree::new(),
        };
        for doc in store.values() {
            index.insert(doc);
        }

        self.indexes.insert(name, index);
        Ok(())
    }

    pub fn drop_index(&mut self, name: &str) -> IndexResult<()> {
        self.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| IndexError::NotFound(name.to_string()))
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    /// Name of the first index (in name order) over `field`
    pub fn index_on(&self, field: &str) -> Option<&str> {
        self.indexes
            .iter()
            .find(|(_, index)| index.field == field)
            .map(|(name, _)| name.as_str())
    }

    /// Index definitions in name order
    pub fn definitions(&self) -> Vec<IndexDefinition> {
        self.indexes
            .iter()
            .map(|(name, index)| IndexDefinition {
                name: name.clone(),
                field: index.field.clone(),
            })
            .collect()
    }

    /// Adds a stored document to every index.
    pub fn insert_document(&mut self, doc: &Document, pipeline: &PipelineContext) {
        trace!(session = %pipeline.session, id = %doc.id(), "indexing document");
        for index in self.indexes.values_mut() {
            index.insert(doc);
        }
    }

    /// Removes a document from every index.
    pub fn delete_document(&mut self, doc: &Document) {
        for index in self.indexes.values_mut() {
            index.remove(doc);
        }
    }

    /// Identifiers whose indexed field equals `value`, ascending
    pub fn lookup_eq(&self, name: &str, value: &Value) -> IndexResult<Vec<DocumentId>> {
        let index = self
            .indexes
            .get(name)
            .ok_or_else(|| IndexError::NotFound(name.to_string()))?;
        Ok(index.tree.lookup_eq(&IndexKey::new(value.clone())))
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(counter: u32, body: Value) -> Document {
        Document::with_id(DocumentId::from_parts(1, counter), body).unwrap()
    }

    fn store_with(docs: &[Document]) -> CollectionStore {
        let mut store = CollectionStore::new();
        for d in docs {
            store.insert_or_assign(d.id(), d.clone().into_ref());
        }
        store
    }

    #[test]
    fn test_create_index_populates_from_store() {
        let a = doc(1, json!({"city": "Oslo"}));
        let b = doc(2, json!({"city": "Rome"}));
        let c = doc(3, json!({"name": "no city"}));
        let store = store_with(&[a.clone(), b, c]);

        let mut engine = IndexEngine::new();
        engine.create_index("by_city", "city", &store).unwrap();

        assert_eq!(engine.lookup_eq("by_city", &json!("Oslo")).unwrap(), vec![a.id()]);
        assert!(engine.lookup_eq("by_city", &json!("Paris")).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_and_missing_index() {
        let store = CollectionStore::new();
        let mut engine = IndexEngine::new();
        engine.create_index("i", "f", &store).unwrap();
        assert_eq!(
            engine.create_index("i", "g", &store),
            Err(IndexError::AlreadyExists("i".into()))
        );
        assert_eq!(engine.drop_index("nope"), Err(IndexError::NotFound("nope".into())));
        assert_eq!(
            engine.lookup_eq("nope", &json!(1)),
            Err(IndexError::NotFound("nope".into()))
        );
        engine.drop_index("i").unwrap();
        assert!(engine.is_empty());
    }

    #[test]
    fn test_insert_and_delete_notifications() {
        let mut engine = IndexEngine::new();
        engine
            .create_index("by_age", "profile.age", &CollectionStore::new())
            .unwrap();

        let pipeline = PipelineContext::detached();
        let d = doc(7, json!({"profile": {"age": 40}}));
        engine.insert_document(&d, &pipeline);
        assert_eq!(engine.lookup_eq("by_age", &json!(40)).unwrap(), vec![d.id()]);

        engine.delete_document(&d);
        assert!(engine.lookup_eq("by_age", &json!(40)).unwrap().is_empty());
    }

    #[test]
    fn test_definitions_listed_by_name() {
        let store = CollectionStore::new();
        let mut engine = IndexEngine::new();
        engine.create_index("b", "y", &store).unwrap();
        engine.create_index("a", "x", &store).unwrap();
        let names: Vec<_> = engine.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(engine.index_on("y"), Some("b"));
        assert_eq!(engine.index_on("z"), None);
    }
}
