//! Collection storage
//!
//! The in-memory store is an ordered map from document identifier to shared
//! document. It is owned by exactly one collection context; all mutation
//! happens inside that context's execution turn, so the store carries no
//! locks.
//!
//! # Iteration order
//!
//! Full iteration is in identifier order. Identifiers are time-ordered, so
//! full scans observe documents oldest first.

mod catalog;
mod context;
mod store;

pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use context::{shard_for, CollectionContext, CollectionName};
pub use store::CollectionStore;
