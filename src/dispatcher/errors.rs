//! Dispatcher error types

use thiserror::Error;

use crate::context::Address;
use crate::index::IndexError;
use crate::operators::ExecutorError;
use crate::recovery::RecoveryError;
use crate::storage::CollectionName;
use crate::wal::WalError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("collection `{0}` not found")]
    CollectionNotFound(CollectionName),

    #[error("collection `{0}` already exists")]
    CollectionExists(CollectionName),

    #[error("timed out waiting for shards: {received} of {expected} replied")]
    ShardTimeout { expected: usize, received: usize },

    #[error("shard {0} is not running")]
    ShardUnavailable(Address),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Wal(#[from] WalError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("recovery failed: {0}")]
    Recovery(#[from] RecoveryError),
}

impl DispatchError {
    /// Stable error code for responses
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::CollectionNotFound(_) => "DISPATCH_COLLECTION_NOT_FOUND",
            DispatchError::CollectionExists(_) => "DISPATCH_COLLECTION_EXISTS",
            DispatchError::ShardTimeout { .. } => "DISPATCH_SHARD_TIMEOUT",
            DispatchError::ShardUnavailable(_) => "DISPATCH_SHARD_UNAVAILABLE",
            DispatchError::Executor(e) => e.code().code(),
            DispatchError::Wal(e) => e.code().code(),
            DispatchError::Index(e) => e.code(),
            DispatchError::Recovery(_) => "DISPATCH_RECOVERY_FAILED",
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
