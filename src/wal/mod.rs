//! Write-Ahead Log (WAL) subsystem
//!
//! The WAL is the authoritative durability mechanism. No mutation is
//! committed until its frame is written (and synced, when enabled), and
//! the store can be rebuilt solely from the verified log.
//!
//! # Design Principles
//!
//! - Log first: mutation operators append before touching the store
//! - Torn tails are truncated, never replayed
//! - Sequential, gap-free sequence numbers
//!
//! Operators talk to the log through [`WalSink`]; recovery and the
//! offline tools use [`WalReader`].

mod checksum;
mod entry;
mod errors;
mod reader;
mod statement;
mod writer;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use checksum::{compute_checksum, payload_checksum, verify_checksum};
pub use entry::{PackedFrame, VerifiedFrame, WalEntry, FRAME_HEADER_LEN, MAX_PAYLOAD_LEN};
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use reader::{recover_bytes, Recovered, WalReader};
pub use statement::{Statement, StatementType};
pub use writer::WalWriter;

/// Location of the log inside a data directory
pub fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal").join("wal.log")
}

/// Destination for logged statements
pub trait WalSink {
    /// Durably records `statement`, returning its sequence number.
    fn append(&mut self, statement: &Statement) -> WalResult<u64>;
}

impl WalSink for WalWriter {
    fn append(&mut self, statement: &Statement) -> WalResult<u64> {
        WalWriter::append(self, statement)
    }
}

/// Sink that records nothing; used while replaying an already durable log
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardWal;

impl WalSink for DiscardWal {
    fn append(&mut self, _statement: &Statement) -> WalResult<u64> {
        Ok(0)
    }
}

/// In-memory sink keeping every statement in order
#[derive(Debug, Default, Clone)]
pub struct MemoryWal {
    statements: Vec<Statement>,
}

impl MemoryWal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

impl WalSink for MemoryWal {
    fn append(&mut self, statement: &Statement) -> WalResult<u64> {
        self.statements.push(statement.clone());
        Ok(self.statements.len() as u64)
    }
}

/// One writer shared by every shard actor of a database.
///
/// Appends are serialized by the lock; sequence numbers stay gap-free
/// across shards.
#[derive(Clone)]
pub struct SharedWal {
    writer: Arc<Mutex<WalWriter>>,
}

impl SharedWal {
    pub fn new(writer: WalWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn last_lsn(&self) -> WalResult<u64> {
        let writer = self.writer.lock().map_err(|_| WalError::lock_poisoned())?;
        Ok(writer.last_lsn())
    }

    /// Appends through the shared writer; callers need no exclusive handle.
    pub fn append(&self, statement: &Statement) -> WalResult<u64> {
        let mut writer = self.writer.lock().map_err(|_| WalError::lock_poisoned())?;
        writer.append(statement)
    }
}

impl WalSink for SharedWal {
    fn append(&mut self, statement: &Statement) -> WalResult<u64> {
        SharedWal::append(self, statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CollectionName;
    use tempfile::TempDir;

    #[test]
    fn test_shared_wal_numbers_across_clones() {
        let temp_dir = TempDir::new().unwrap();
        let shared = SharedWal::new(WalWriter::open(temp_dir.path(), false).unwrap());
        let mut a = shared.clone();
        let mut b = shared.clone();
        let stmt = Statement::CreateCollection {
            collection: CollectionName::new("db", "c"),
        };

        assert_eq!(a.append(&stmt).unwrap(), 1);
        assert_eq!(b.append(&stmt).unwrap(), 2);
        assert_eq!(shared.last_lsn().unwrap(), 2);
    }

    #[test]
    fn test_memory_wal_keeps_order() {
        let mut wal = MemoryWal::new();
        let a = Statement::DropIndex {
            collection: CollectionName::new("db", "c"),
            name: "i".into(),
        };
        wal.append(&a).unwrap();
        assert_eq!(wal.statements(), &[a]);
    }
}
