//! WAL reader and torn-tail detection
//!
//! Frames are verified sequentially from the start of the log. The log
//! ends at the first frame that fails verification:
//! - truncated header or payload
//! - checksum mismatch
//! - broken chain (`last_crc32` differs from the previous frame's checksum)
//! - sequence number that is not exactly the previous one plus one
//!   (the first frame must carry 1)
//!
//! That frame and every byte after it are a torn tail. It is reported,
//! never replayed, and never surfaced to callers as an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::entry::{VerifiedFrame, WalEntry};
use super::errors::{WalError, WalResult};

/// Result of scanning a log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovered {
    /// Verified frames in sequence order
    pub entries: Vec<VerifiedFrame>,
    /// Length of the verified prefix in bytes
    pub valid_len: u64,
    /// Bytes after the verified prefix
    pub discarded_bytes: u64,
}

impl Recovered {
    /// Sequence number of the last verified frame, 0 for an empty log
    pub fn last_lsn(&self) -> u64 {
        self.entries.last().map(|f| f.entry.lsn).unwrap_or(0)
    }

    /// Checksum of the last verified frame, 0 for an empty log
    pub fn last_crc32(&self) -> u32 {
        self.entries.last().map(|f| f.crc32).unwrap_or(0)
    }

    pub fn has_torn_tail(&self) -> bool {
        self.discarded_bytes > 0
    }

    pub fn into_entries(self) -> impl Iterator<Item = WalEntry> {
        self.entries.into_iter().map(|frame| frame.entry)
    }
}

/// WAL reader for recovery and offline inspection.
pub struct WalReader {
    wal_path: PathBuf,
}

impl WalReader {
    pub fn open(wal_path: &Path) -> Self {
        Self {
            wal_path: wal_path.to_path_buf(),
        }
    }

    /// Opens the log of a data directory (`<data_dir>/wal/wal.log`).
    pub fn open_from_data_dir(data_dir: &Path) -> Self {
        Self::open(&super::wal_path(data_dir))
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Reads the whole log and returns its verified prefix.
    ///
    /// A missing file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns `WAL_CORRUPTION` only if the file exists but cannot be read.
    pub fn recover(&self) -> WalResult<Recovered> {
        let bytes = match fs::read(&self.wal_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.wal_path.display(), "no WAL file, starting empty");
                return Ok(Recovered::default());
            }
            Err(e) => {
                return Err(WalError::corruption(format!(
                    "failed to read WAL file {}: {}",
                    self.wal_path.display(),
                    e
                )))
            }
        };
        Ok(recover_bytes(&bytes))
    }
}

/// Scans an in-memory log image.
pub fn recover_bytes(bytes: &[u8]) -> Recovered {
    let mut recovered = Recovered::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let frame = match WalEntry::unpack(&bytes[offset..]) {
            Ok(frame) => frame,
            Err(e) => {
                report_torn_tail(offset, bytes.len(), &e);
                break;
            }
        };

        let expected_lsn = recovered.last_lsn() + 1;
        if frame.entry.lsn != expected_lsn {
            let err = WalError::corruption_at_offset(
                offset as u64,
                format!(
                    "non-sequential lsn: expected {}, got {}",
                    expected_lsn, frame.entry.lsn
                ),
            );
            report_torn_tail(offset, bytes.len(), &err);
            break;
        }
        if frame.entry.last_crc32 != recovered.last_crc32() {
            let err = WalError::corruption_at_offset(
                offset as u64,
                format!(
                    "broken chain at lsn {}: expected {:08x}, got {:08x}",
                    frame.entry.lsn,
                    recovered.last_crc32(),
                    frame.entry.last_crc32
                ),
            );
            report_torn_tail(offset, bytes.len(), &err);
            break;
        }

        offset += frame.len;
        recovered.entries.push(frame);
    }

    recovered.valid_len = offset as u64;
    recovered.discarded_bytes = (bytes.len() - offset) as u64;
    recovered
}

fn report_torn_tail(offset: usize, total: usize, reason: &WalError) {
    warn!(
        offset,
        discarded_bytes = total - offset,
        reason = %reason,
        "WAL torn tail discarded"
    );
}
