//! CLI module for collectiondb
//!
//! Provides command-line interface for:
//! - wal dump / wal verify: offline log inspection
//! - recover: replay the log and report what it rebuilds
//! - query: execute JSON plans from stdin

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, ConfigArg, WalCommand};
pub use commands::{query, recover, run_command, wal_dump, wal_verify};
pub use errors::{CliError, CliResult};
pub use io::{parse_request, QueryRequest};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
