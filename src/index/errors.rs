//! Index engine error types

use thiserror::Error;

/// Errors raised by secondary index maintenance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index `{0}` already exists")]
    AlreadyExists(String),

    #[error("index `{0}` not found")]
    NotFound(String),

    #[error("index field path must not be empty")]
    EmptyField,
}

impl IndexError {
    /// Stable error code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::AlreadyExists(_) => "INDEX_ALREADY_EXISTS",
            IndexError::NotFound(_) => "INDEX_NOT_FOUND",
            IndexError::EmptyField => "INDEX_INVALID_FIELD",
        }
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
