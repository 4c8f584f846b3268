//! CLI command implementations
//!
//! The inspection commands (`wal dump`, `wal verify`, `recover`) only read
//! the log. `query` opens the dispatcher, which truncates a torn tail
//! before serving.

use std::io::{self, BufRead};
use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::recovery;
use crate::wal::{Recovered, WalReader};

use super::args::{Command, WalCommand};
use super::errors::{CliError, CliResult};
use super::io::{parse_request, read_lines, write_error, write_json, write_response};

/// Run a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Wal {
            command: WalCommand::Dump(arg),
        } => wal_dump(&arg.config),
        Command::Wal {
            command: WalCommand::Verify(arg),
        } => wal_verify(&arg.config),
        Command::Recover(arg) => recover(&arg.config),
        Command::Query(arg) => query(&arg.config),
    }
}

fn scan(config: &Config) -> CliResult<Recovered> {
    Ok(WalReader::open_from_data_dir(config.data_path()).recover()?)
}

/// Print every verified frame as one JSON line
pub fn wal_dump(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    for frame in scan(&config)?.entries {
        write_json(&json!({
            "lsn": frame.entry.lsn,
            "type": frame.entry.statement_type().as_str(),
            "last_crc32": frame.entry.last_crc32,
            "crc32": frame.crc32,
            "statement": serde_json::to_value(&frame.entry.statement)?,
        }))?;
    }
    Ok(())
}

pub fn wal_verify(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    write_json(&verify_report(&scan(&config)?))
}

fn verify_report(recovered: &Recovered) -> Value {
    json!({
        "frames": recovered.entries.len(),
        "last_lsn": recovered.last_lsn(),
        "valid_len": recovered.valid_len,
        "discarded_bytes": recovered.discarded_bytes,
        "torn_tail": recovered.has_torn_tail(),
    })
}

/// Replay the log into memory and print what it rebuilds
pub fn recover(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let (catalog, report) = recovery::recover(config.data_path())?;

    let mut collections = Map::new();
    for (name, context) in catalog.iter() {
        let indexes: Vec<String> = context
            .indexes()
            .definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        collections.insert(
            name.to_string(),
            json!({ "documents": context.store().len(), "indexes": indexes }),
        );
    }

    write_json(&json!({
        "last_lsn": report.stats.final_sequence,
        "entries_replayed": report.stats.records_replayed,
        "discarded_bytes": report.discarded_bytes,
        "collections": collections,
    }))
}

/// Serve plans from stdin until end of input
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let dispatcher = Dispatcher::open(config).await?;
        let served = serve(&dispatcher, io::stdin().lock()).await?;
        info!(requests = served, "query input exhausted");
        Ok::<(), CliError>(())
    })
}

/// Answers each request line with one response line. A failed request is
/// reported and does not stop the loop.
async fn serve<R: BufRead>(dispatcher: &Dispatcher, input: R) -> CliResult<usize> {
    let mut served = 0;
    for line in read_lines(input) {
        let line = line?;
        served += 1;

        let request = match parse_request(&line) {
            Ok(request) => request,
            Err(e) => {
                write_error(e.code(), &e.to_string())?;
                continue;
            }
        };

        let parameters = request.storage_parameters();
        match dispatcher.execute(request.plan, parameters).await {
            Ok(result) => write_response(result.to_json())?,
            Err(e) => {
                let e = CliError::from(e);
                write_error(e.code(), &e.to_string())?;
            }
        }
    }
    Ok(served)
}
