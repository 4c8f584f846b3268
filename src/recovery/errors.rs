//! Recovery error types
//!
//! A verified log that cannot be applied means the log and the code
//! disagree; every variant is fatal to startup.

use thiserror::Error;

use crate::index::IndexError;
use crate::operators::ExecutorError;
use crate::storage::CatalogError;
use crate::wal::WalError;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("failed to read WAL: {0}")]
    Wal(#[from] WalError),

    #[error("replay of lsn {lsn} failed: {source}")]
    Catalog {
        lsn: u64,
        #[source]
        source: CatalogError,
    },

    #[error("replay of lsn {lsn} failed: {source}")]
    Index {
        lsn: u64,
        #[source]
        source: IndexError,
    },

    #[error("replay of lsn {lsn} failed: {source}")]
    Execution {
        lsn: u64,
        #[source]
        source: ExecutorError,
    },
}

impl RecoveryError {
    /// Sequence number of the statement that failed to apply
    pub fn lsn(&self) -> Option<u64> {
        match self {
            RecoveryError::Wal(_) => None,
            RecoveryError::Catalog { lsn, .. }
            | RecoveryError::Index { lsn, .. }
            | RecoveryError::Execution { lsn, .. } => Some(*lsn),
        }
    }
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;
