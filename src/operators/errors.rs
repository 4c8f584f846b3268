//! Executor error types
//!
//! Error codes:
//! - EXEC_DUPLICATE_KEY (ERROR)
//! - EXEC_INVALID_PLAN (ERROR)
//! - EXEC_UNBOUND_PARAMETER (ERROR)
//! - EXEC_INDEX_FAILED (ERROR)
//! - EXEC_WAL_APPEND (ERROR, FATAL when the log failed to sync)

use std::fmt;

use crate::context::ParameterId;
use crate::document::DocumentId;
use crate::index::IndexError;
use crate::wal::WalError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query failed; the store and the log are intact
    Error,
    /// The process must stop accepting writes
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Primary-key guard found a colliding identifier
    DuplicateKey,
    /// The operator tree cannot be built or run as given
    InvalidPlan,
    /// A predicate references a parameter the context does not bind
    UnboundParameter,
    /// Secondary index lookup or maintenance failed
    IndexFailed,
    /// The statement could not be appended to the WAL
    WalAppend,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::DuplicateKey => "EXEC_DUPLICATE_KEY",
            ExecutorErrorCode::InvalidPlan => "EXEC_INVALID_PLAN",
            ExecutorErrorCode::UnboundParameter => "EXEC_UNBOUND_PARAMETER",
            ExecutorErrorCode::IndexFailed => "EXEC_INDEX_FAILED",
            ExecutorErrorCode::WalAppend => "EXEC_WAL_APPEND",
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    severity: Severity,
    message: String,
    /// Colliding identifier for duplicate-key errors
    key: Option<DocumentId>,
    source: Option<WalError>,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            key: None,
            source: None,
        }
    }

    pub fn duplicate_key(id: DocumentId) -> Self {
        Self {
            key: Some(id),
            ..Self::new(
                ExecutorErrorCode::DuplicateKey,
                format!("document {} already exists", id),
            )
        }
    }

    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::InvalidPlan, reason)
    }

    pub fn unbound_parameter(id: ParameterId) -> Self {
        Self::new(
            ExecutorErrorCode::UnboundParameter,
            format!("parameter ${} is not bound", id),
        )
    }

    pub fn index_failed(err: IndexError) -> Self {
        Self::new(ExecutorErrorCode::IndexFailed, err.to_string())
    }

    /// Wraps a log failure; inherits fatality from the WAL error
    pub fn wal_append(err: WalError) -> Self {
        let severity = if err.is_fatal() {
            Severity::Fatal
        } else {
            Severity::Error
        };
        Self {
            severity,
            message: err.message().to_string(),
            source: Some(err),
            ..Self::new(ExecutorErrorCode::WalAppend, "")
        }
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Colliding identifier, for duplicate-key errors
    pub fn key(&self) -> Option<DocumentId> {
        self.key
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code.code(), self.message)
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<IndexError> for ExecutorError {
    fn from(err: IndexError) -> Self {
        Self::index_failed(err)
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
