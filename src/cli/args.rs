//! CLI argument definitions using clap
//!
//! Commands:
//! - collectiondb wal dump --config <path>
//! - collectiondb wal verify --config <path>
//! - collectiondb recover --config <path>
//! - collectiondb query --config <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// collectiondb - document collection execution core
#[derive(Parser, Debug)]
#[command(name = "collectiondb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Path to configuration file
    #[arg(long, default_value = "./collectiondb.json")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the write-ahead log
    Wal {
        #[command(subcommand)]
        command: WalCommand,
    },

    /// Replay the log and print per-collection counts
    Recover(ConfigArg),

    /// Execute JSON plans read from stdin, one per line
    Query(ConfigArg),
}

#[derive(Subcommand, Debug)]
pub enum WalCommand {
    /// Print every verified frame as one JSON line
    Dump(ConfigArg),

    /// Report the verified prefix and any torn tail
    Verify(ConfigArg),
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
