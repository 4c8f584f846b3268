//! Collection catalog used by recovery and offline tooling

use std::collections::BTreeMap;

use thiserror::Error;

use super::context::{CollectionContext, CollectionName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("collection `{0}` already exists")]
    CollectionExists(CollectionName),

    #[error("collection `{0}` not found")]
    CollectionNotFound(CollectionName),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// All collection contexts of one database instance, in name order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    collections: BTreeMap<CollectionName, CollectionContext>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_collection(&mut self, name: CollectionName) -> CatalogResult<&mut CollectionContext> {
        if self.collections.contains_key(&name) {
            return Err(CatalogError::CollectionExists(name));
        }
        Ok(self
            .collections
            .entry(name.clone())
            .or_insert_with(|| CollectionContext::new(name)))
    }

    pub fn drop_collection(&mut self, name: &CollectionName) -> CatalogResult<CollectionContext> {
        self.collections
            .remove(name)
            .ok_or_else(|| CatalogError::CollectionNotFound(name.clone()))
    }

    pub fn get(&self, name: &CollectionName) -> CatalogResult<&CollectionContext> {
        self.collections
            .get(name)
            .ok_or_else(|| CatalogError::CollectionNotFound(name.clone()))
    }

    pub fn get_mut(&mut self, name: &CollectionName) -> CatalogResult<&mut CollectionContext> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| CatalogError::CollectionNotFound(name.clone()))
    }

    pub fn contains(&self, name: &CollectionName) -> bool {
        self.collections.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CollectionName, &CollectionContext)> {
        self.collections.iter()
    }

    pub fn into_collections(self) -> impl Iterator<Item = (CollectionName, CollectionContext)> {
        self.collections.into_iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_drop() {
        let mut catalog = Catalog::new();
        let name = CollectionName::new("db", "users");

        catalog.create_collection(name.clone()).unwrap();
        assert!(catalog.contains(&name));
        assert_eq!(
            catalog.create_collection(name.clone()).err(),
            Some(CatalogError::CollectionExists(name.clone()))
        );

        catalog.drop_collection(&name).unwrap();
        assert_eq!(
            catalog.get(&name).err(),
            Some(CatalogError::CollectionNotFound(name))
        );
    }
}
