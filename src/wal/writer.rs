//! WAL writer
//!
//! - Append-only, single file at `<data_dir>/wal/wal.log`
//! - A torn tail found on open is truncated before the first append
//! - With `fsync` enabled every append is followed by `sync_data`;
//!   acknowledgment before fsync is forbidden
//! - A failed append is cut back to the last verified frame; if that is
//!   impossible, or fsync failed, the writer refuses further appends

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use super::entry::WalEntry;
use super::errors::{WalError, WalResult};
use super::reader::{Recovered, WalReader};
use super::statement::Statement;

/// WAL writer that chains and numbers every appended frame.
pub struct WalWriter {
    wal_path: PathBuf,
    file: File,
    /// Next sequence number to assign (starts at 1, never reused)
    next_lsn: u64,
    /// Checksum of the last frame written, 0 for an empty log
    last_crc32: u32,
    /// File length after the last acknowledged frame
    valid_len: u64,
    failed: bool,
    fsync: bool,
}

impl WalWriter {
    /// Opens or creates the log of `data_dir`, resuming after its last
    /// verified frame.
    pub fn open(data_dir: &Path, fsync: bool) -> WalResult<Self> {
        let (writer, _) = Self::open_with_recovery(data_dir, fsync)?;
        Ok(writer)
    }

    /// Like [`WalWriter::open`], also returning what was recovered.
    ///
    /// # Errors
    ///
    /// Returns `WAL_APPEND_FAILED` if the directory or file cannot be
    /// created, opened, or truncated.
    pub fn open_with_recovery(data_dir: &Path, fsync: bool) -> WalResult<(Self, Recovered)> {
        let wal_path = super::wal_path(data_dir);
        if let Some(wal_dir) = wal_path.parent() {
            fs::create_dir_all(wal_dir).map_err(|e| {
                WalError::append_failed(
                    format!("failed to create WAL directory: {}", wal_dir.display()),
                    e,
                )
            })?;
        }

        let recovered = WalReader::open(&wal_path).recover()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| {
                WalError::append_failed(format!("failed to open WAL file: {}", wal_path.display()), e)
            })?;

        if recovered.has_torn_tail() {
            file.set_len(recovered.valid_len).map_err(|e| {
                WalError::append_failed("failed to truncate WAL torn tail", e)
            })?;
            file.sync_all()
                .map_err(|e| WalError::fsync_failed("fsync failed after WAL truncation", e))?;
            info!(
                valid_len = recovered.valid_len,
                discarded_bytes = recovered.discarded_bytes,
                "WAL truncated to last verified frame"
            );
        }

        let writer = Self {
            wal_path,
            file,
            next_lsn: recovered.last_lsn() + 1,
            last_crc32: recovered.last_crc32(),
            valid_len: recovered.valid_len,
            failed: false,
            fsync,
        };
        Ok((writer, recovered))
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Returns the last assigned sequence number, or 0 if nothing was written.
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    pub fn last_crc32(&self) -> u32 {
        self.last_crc32
    }

    /// Appends a statement and returns its sequence number.
    ///
    /// # Errors
    ///
    /// - `WAL_ENCODING` / `WAL_PAYLOAD_TOO_LARGE` if the statement cannot be framed
    /// - `WAL_APPEND_FAILED` if the write fails or the writer has failed before
    /// - `WAL_FSYNC_FAILED` if fsync fails (FATAL)
    pub fn append(&mut self, statement: &Statement) -> WalResult<u64> {
        if self.failed {
            return Err(WalError::writer_failed());
        }

        let lsn = self.next_lsn;
        let packed = WalEntry::new(self.last_crc32, lsn, statement.clone()).pack()?;

        if let Err(e) = self.write_frame(&packed.bytes, lsn) {
            return Err(self.abort_append(e));
        }

        self.next_lsn += 1;
        self.last_crc32 = packed.crc32;
        self.valid_len += packed.bytes.len() as u64;
        debug!(lsn, statement_type = %statement.statement_type(), "WAL frame appended");
        Ok(lsn)
    }

    fn write_frame(&mut self, bytes: &[u8], lsn: u64) -> WalResult<()> {
        self.file.write_all(bytes).map_err(|e| {
            WalError::append_failed(format!("failed to write WAL frame at lsn {}", lsn), e)
        })?;

        if self.fsync {
            self.file.sync_data().map_err(|e| {
                WalError::fsync_failed(format!("fsync failed after WAL append at lsn {}", lsn), e)
            })?;
        }
        Ok(())
    }

    /// Cuts the file back to the last acknowledged frame after a failed
    /// append. The writer stops accepting appends if the cut fails or the
    /// failure was an fsync.
    fn abort_append(&mut self, err: WalError) -> WalError {
        if let Err(e) = self.file.set_len(self.valid_len) {
            error!(valid_len = self.valid_len, error = %e, "failed to cut back partial WAL frame");
            self.failed = true;
        }
        if err.is_fatal() {
            self.failed = true;
        }
        if self.failed {
            error!(error = %err, "WAL writer stopped");
        }
        err
    }

    /// True once an append failure left the log unusable for further writes
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Explicitly fsync the WAL file.
    pub fn fsync(&self) -> WalResult<()> {
        self.file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("explicit WAL fsync failed", e))
    }
}
