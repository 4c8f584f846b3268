//! Configuration file structure
//!
//! A JSON object; every field is optional:
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "shards_per_collection": 1,
//!   "shard_timeout_ms": 5000,
//!   "mailbox_capacity": 64,
//!   "wal_fsync": true
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory; the WAL lives at `<data_dir>/wal/wal.log`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Shard actors per collection (>= 1)
    #[serde(default = "default_shards_per_collection")]
    pub shards_per_collection: usize,

    /// Bound wait for all shard replies of one query, in milliseconds
    #[serde(default = "default_shard_timeout_ms")]
    pub shard_timeout_ms: u64,

    /// Queued messages per shard mailbox
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// fsync after every WAL append
    #[serde(default = "default_wal_fsync")]
    pub wal_fsync: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_shards_per_collection() -> usize {
    1
}
fn default_shard_timeout_ms() -> u64 {
    5000
}
fn default_mailbox_capacity() -> usize {
    64
}
fn default_wal_fsync() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            shards_per_collection: default_shards_per_collection(),
            shard_timeout_ms: default_shard_timeout_ms(),
            mailbox_capacity: default_mailbox_capacity(),
            wal_fsync: default_wal_fsync(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.shards_per_collection == 0 {
            return Err(ConfigError::Invalid(
                "shards_per_collection must be >= 1".into(),
            ));
        }
        if self.shard_timeout_ms == 0 {
            return Err(ConfigError::Invalid("shard_timeout_ms must be > 0".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }
}
