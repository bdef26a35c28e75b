//! Configuration parsing for the dealflow CLI.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Args;
use std::path::PathBuf;

use crate::cache::DEFAULT_MAX_BYTES;
use crate::observability::tracing::LogFormat;

/// File name of the SQLite database inside the data directory.
pub const DB_FILE_NAME: &str = "dealflow.db";

// Flattened into the `dealflow` parser.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Data directory for the SQLite database
    #[arg(short, long, env = "DEALFLOW_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// User that owns single-row stores such as settings
    #[arg(short, long, env = "DEALFLOW_USER", default_value = "local")]
    pub user: String,

    /// Size of the SQLite connection pool
    #[arg(long, env = "DEALFLOW_POOL_SIZE", default_value_t = 4)]
    pub pool_size: u32,

    /// Byte budget of the in-memory result cache
    #[arg(long, env = "DEALFLOW_CACHE_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    pub cache_max_bytes: usize,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "DEALFLOW_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

impl Config {
    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    /// Create a configuration for tests rooted at `data_dir`.
    pub fn test_config(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            user: "test-user".into(),
            pool_size: 2,
            cache_max_bytes: 1024 * 1024,
            log_level: "debug".into(),
            log_format: LogFormat::Text,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            user: "local".into(),
            pool_size: 4,
            cache_max_bytes: DEFAULT_MAX_BYTES,
            log_level: "warn".into(),
            log_format: LogFormat::Text,
        }
    }
}
