//! collectiondb - physical execution core of a document database
//!
//! Logical plans become operator trees that scan, filter, sort, aggregate,
//! insert and delete documents in sharded in-memory collections. Every
//! mutation is logged to a checksummed, chained write-ahead log before it
//! touches the store, and the store is rebuilt from that log on startup.

pub mod cli;
pub mod config;
pub mod context;
pub mod cursor;
pub mod dispatcher;
pub mod document;
pub mod index;
pub mod operators;
pub mod planner;
pub mod predicate;
pub mod recovery;
pub mod storage;
pub mod wal;
