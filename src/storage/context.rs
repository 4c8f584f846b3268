//! Collection context: one collection (or shard) and its indexes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::index::{IndexEngine, IndexResult};

use super::store::CollectionStore;

/// Fully qualified collection name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionName {
    pub database: String,
    pub collection: String,
}

impl CollectionName {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Shard a document identifier routes to.
///
/// Stable across processes: CRC32 of the identifier bytes modulo the shard
/// count.
pub fn shard_for(id: &DocumentId, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    crc32fast::hash(id.as_bytes()) as usize % shards
}

/// Store plus index engine, owned by exactly one execution context.
///
/// Only the operator tree running inside the owner's execution turn may
/// mutate it.
#[derive(Debug, Clone)]
pub struct CollectionContext {
    name: CollectionName,
    store: CollectionStore,
    indexes: IndexEngine,
}

impl CollectionContext {
    pub fn new(name: CollectionName) -> Self {
        Self {
            name,
            store: CollectionStore::new(),
            indexes: IndexEngine::new(),
        }
    }

    pub fn name(&self) -> &CollectionName {
        &self.name
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn indexes(&self) -> &IndexEngine {
        &self.indexes
    }

    /// Mutable access to the store and indexes together
    pub fn parts_mut(&mut self) -> (&mut CollectionStore, &mut IndexEngine) {
        (&mut self.store, &mut self.indexes)
    }

    pub fn create_index(&mut self, name: &str, field: &str) -> IndexResult<()> {
        self.indexes.create_index(name, field, &self.store)
    }

    pub fn drop_index(&mut self, name: &str) -> IndexResult<()> {
        self.indexes.drop_index(name)
    }

    /// Partitions this context into `shards` contexts by [`shard_for`].
    ///
    /// Each shard carries every index definition, rebuilt over its own
    /// documents.
    pub fn split(self, shards: usize) -> IndexResult<Vec<CollectionContext>> {
        let shards = shards.max(1);
        let mut parts: Vec<CollectionContext> = (0..shards)
            .map(|_| CollectionContext::new(self.name.clone()))
            .collect();

        for (id, doc) in self.store.iter() {
            parts[shard_for(id, shards)]
                .store
                .insert_or_assign(*id, doc.clone());
        }

        for definition in self.indexes.definitions() {
            for part in &mut parts {
                part.create_index(&definition.name, &definition.field)?;
            }
        }

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use serde_json::json;

    #[test]
    fn test_split_preserves_documents_and_indexes() {
        let mut ctx = CollectionContext::new(CollectionName::new("db", "c"));
        for i in 0..20 {
            let doc = Document::with_id(DocumentId::from_parts(1, i), json!({"k": i % 2}))
                .unwrap()
                .into_ref();
            let (store, _) = ctx.parts_mut();
            store.insert_or_assign(doc.id(), doc);
        }
        ctx.create_index("by_k", "k").unwrap();

        let parts = ctx.split(3).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(|p| p.store().len()).sum::<usize>(), 20);

        let mut evens = 0;
        for (shard, part) in parts.iter().enumerate() {
            assert!(part.indexes().has_index("by_k"));
            for id in part.store().iter().map(|(id, _)| id) {
                assert_eq!(shard_for(id, 3), shard);
            }
            evens += part.indexes().lookup_eq("by_k", &json!(0)).unwrap().len();
        }
        assert_eq!(evens, 10);
    }

    #[test]
    fn test_single_shard_routes_to_zero() {
        assert_eq!(shard_for(&DocumentId::from_parts(9, 9), 1), 0);
        assert_eq!(shard_for(&DocumentId::from_parts(9, 9), 0), 0);
    }
}
