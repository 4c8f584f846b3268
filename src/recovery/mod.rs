//! Crash recovery
//!
//! Startup sequence:
//!
//! 1. Scan the WAL from byte 0, keeping the longest verified prefix
//! 2. Replay every verified statement in sequence order into an empty catalog
//! 3. Hand the catalog to the dispatcher, which splits it into shards
//!
//! A torn tail is never an error. A verified statement that cannot be
//! applied halts startup.

mod errors;
mod replay;

use std::path::Path;

use tracing::info;

use crate::storage::Catalog;
use crate::wal::{Recovered, WalReader};

pub use errors::{RecoveryError, RecoveryResult};
pub use replay::{replay, ReplayStats};

/// Outcome of one recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub stats: ReplayStats,
    /// Length of the verified WAL prefix in bytes
    pub valid_len: u64,
    /// Torn-tail bytes that were not replayed
    pub discarded_bytes: u64,
}

/// Rebuilds the catalog from an already scanned log.
pub fn rebuild(recovered: Recovered) -> RecoveryResult<(Catalog, RecoveryReport)> {
    let valid_len = recovered.valid_len;
    let discarded_bytes = recovered.discarded_bytes;

    let mut catalog = Catalog::new();
    let stats = replay(recovered.into_entries(), &mut catalog)?;

    info!(
        entries = stats.records_replayed,
        last_lsn = stats.final_sequence,
        valid_len,
        discarded_bytes,
        "recovery complete"
    );

    Ok((
        catalog,
        RecoveryReport {
            stats,
            valid_len,
            discarded_bytes,
        },
    ))
}

/// Rebuilds the catalog from the WAL under `data_dir` without modifying it.
pub fn recover(data_dir: &Path) -> RecoveryResult<(Catalog, RecoveryReport)> {
    let recovered = WalReader::open_from_data_dir(data_dir).recover()?;
    rebuild(recovered)
}
