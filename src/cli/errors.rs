//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatcher::DispatchError;
use crate::recovery::RecoveryError;
use crate::wal::WalError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Wal(#[from] WalError),

    #[error("{0}")]
    Recovery(#[from] RecoveryError),

    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "CLI_CONFIG_ERROR",
            CliError::Wal(e) => e.code().code(),
            CliError::Recovery(_) => "CLI_RECOVERY_FAILED",
            CliError::Dispatch(e) => e.code(),
            CliError::Io(_) => "CLI_IO_ERROR",
            CliError::Json(_) => "CLI_INVALID_JSON",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
