//! dealflow: command-line access to the CRM row stores.
//!
//! # Usage
//!
//! ```bash
//! dealflow --data-dir ./data add leads '{"company":"Acme","status":"new"}'
//! dealflow rows leads --where status=new --limit 10
//! dealflow --user ann settings set theme '"dark"'
//! ```
//!
//! Environment variables can also be used:
//! - `DEALFLOW_DATA_DIR`: Data directory for SQLite
//! - `DEALFLOW_USER`: Owner of single-row stores
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dealflow::config::Config;
use dealflow::observability::tracing::init_tracing;
use dealflow::sync::SqliteClient;
use std::fs;
use std::sync::Arc;

/// Command-line interface for the dealflow CRM data layer.
#[derive(Parser)]
#[command(name = "dealflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List rows of a table
    Rows {
        /// Table name
        table: String,
        /// Equality filter as field=value (repeatable; value parsed as JSON when possible)
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Insert a row from a JSON object
    Add {
        /// Table name
        table: String,
        /// Row as a JSON object
        json: String,
    },
    /// Merge a JSON object into an existing row
    Update {
        /// Table name
        table: String,
        /// Row id
        id: String,
        /// Fields to change as a JSON object
        json: String,
    },
    /// Remove rows by id
    Remove {
        /// Table name
        table: String,
        /// Row ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Read or change the current user's settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Show which rows a virtual-scroll viewport would render
    Window {
        /// Table name
        table: String,
        /// Scroll offset in pixels
        #[arg(long, default_value_t = 0.0)]
        scroll_top: f64,
        /// Default item height in pixels
        #[arg(long, default_value_t = 48.0)]
        item_height: f64,
        /// Viewport height in pixels
        #[arg(long, default_value_t = 600.0)]
        container_height: f64,
        /// Extra items rendered on each side
        #[arg(long, default_value_t = 5)]
        overscan: usize,
    },
    /// Load tables into the memory cache and report its occupancy
    CacheStats {
        /// Table names
        #[arg(required = true)]
        tables: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the settings row, or one field of it
    Get {
        /// Field name
        field: Option<String>,
    },
    /// Set one field (value parsed as JSON when possible)
    Set { field: String, value: String },
    /// Create the settings row from defaults if missing
    Init,
    /// Restore default values
    Reset,
    /// Delete the settings row
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;

    init_tracing(&config.log_level, config.log_format);

    fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            config.data_dir.display()
        )
    })?;
    let client = Arc::new(
        SqliteClient::open(config.db_path(), config.pool_size)
            .with_context(|| format!("failed to open {}", config.db_path().display()))?,
    );
    let format = cli.output;

    match cli.command {
        Commands::Rows {
            table,
            filters,
            limit,
        } => commands::rows::list(client, &table, &filters, limit, format).await?,
        Commands::Add { table, json } => commands::rows::add(client, &table, &json, format).await?,
        Commands::Update { table, id, json } => {
            commands::rows::update(client, &table, &id, &json, format).await?;
        }
        Commands::Remove { table, ids } => {
            commands::rows::remove(client, &table, &ids, format).await?;
        }
        Commands::Settings { action } => {
            commands::settings::run(client, &config.user, action, format).await?;
        }
        Commands::Window {
            table,
            scroll_top,
            item_height,
            container_height,
            overscan,
        } => {
            let viewport = dealflow::scroll::VirtualScrollConfig {
                item_height,
                overscan,
                container_height,
                estimated_item_height: None,
            };
            commands::window::run(client, &table, viewport, scroll_top, format).await?;
        }
        Commands::CacheStats { tables } => {
            commands::cache::run(client, &tables, config.cache_max_bytes, format).await?;
        }
    }

    Ok(())
}
