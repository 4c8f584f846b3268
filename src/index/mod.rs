//! Secondary index engine
//!
//! Indexes are derived, in-memory-only state. Mutation operators notify the
//! engine after each store change; recovery rebuilds indexes by replaying
//! the `create_index` statements recorded in the WAL.
//!
//! # Design Principles
//!
//! - Derived state: the store is the source of truth
//! - Deterministic: BTreeMap keys, BTreeSet identifier lists

mod btree;
mod errors;
mod manager;

pub use btree::{IndexKey, IndexTree};
pub use errors::{IndexError, IndexResult};
pub use manager::{IndexDefinition, IndexEngine};
