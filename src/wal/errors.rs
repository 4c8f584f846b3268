//! WAL error types
//!
//! Error codes:
//! - WAL_APPEND_FAILED (ERROR severity)
//! - WAL_FSYNC_FAILED (FATAL severity)
//! - WAL_CORRUPTION (ERROR severity, recovered by truncating the torn tail)
//! - WAL_PAYLOAD_TOO_LARGE (ERROR severity)
//! - WAL_ENCODING (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for WAL errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the process continues
    Error,
    /// The log can no longer be trusted; writes must stop
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

/// WAL-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// WAL write failed
    WalAppendFailed,
    /// WAL fsync failed
    WalFsyncFailed,
    /// Frame failed verification
    WalCorruption,
    /// Encoded statement does not fit the 16-bit size field
    WalPayloadTooLarge,
    /// Statement could not be encoded or decoded
    WalEncoding,
}

impl WalErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::WalAppendFailed => "WAL_APPEND_FAILED",
            WalErrorCode::WalFsyncFailed => "WAL_FSYNC_FAILED",
            WalErrorCode::WalCorruption => "WAL_CORRUPTION",
            WalErrorCode::WalPayloadTooLarge => "WAL_PAYLOAD_TOO_LARGE",
            WalErrorCode::WalEncoding => "WAL_ENCODING",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::WalFsyncFailed => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// WAL error type with full context
#[derive(Debug)]
pub struct WalError {
    code: WalErrorCode,
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl WalError {
    fn new(code: WalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(WalErrorCode::WalAppendFailed, message)
        }
    }

    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(WalErrorCode::WalFsyncFailed, message)
        }
    }

    /// The shared writer's lock was poisoned by a panicking holder
    pub fn lock_poisoned() -> Self {
        Self::new(WalErrorCode::WalAppendFailed, "WAL writer lock poisoned")
    }

    /// A previous append could not be undone or was not made durable
    pub fn writer_failed() -> Self {
        Self::new(
            WalErrorCode::WalAppendFailed,
            "WAL writer stopped after an unrecoverable append failure",
        )
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::WalCorruption, message)
    }

    /// Corruption with the byte offset of the offending frame
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("byte_offset: {}", offset)),
            ..Self::corruption(reason)
        }
    }

    pub fn payload_too_large(size: usize, max: usize) -> Self {
        Self {
            details: Some(format!("size: {}, max: {}", size, max)),
            ..Self::new(WalErrorCode::WalPayloadTooLarge, "statement payload too large")
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::WalEncoding, message)
    }

    pub fn code(&self) -> WalErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal (writes must stop)
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for WalError {
    fn from(err: serde_json::Error) -> Self {
        Self::encoding(err.to_string())
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;
