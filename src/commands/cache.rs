//! Cache footprint command.

use anyhow::{Context, Result};
use dealflow::cache::{CacheStats, MemoryCache};
use dealflow::store::TableStore;
use dealflow::sync::{Row, SqliteClient};
use serde::Serialize;
use std::sync::Arc;

use super::print_json;
use crate::OutputFormat;

#[derive(Serialize)]
struct CacheOutput {
    cached: Vec<String>,
    evicted: Vec<String>,
    stats: CacheStats,
}

/// Load each table's rows into one cache, in argument order, and report
/// which tables survived eviction.
pub async fn run(
    client: Arc<SqliteClient>,
    tables: &[String],
    max_bytes: usize,
    format: OutputFormat,
) -> Result<()> {
    let mut cache: MemoryCache<String, Vec<Row>> = MemoryCache::new(max_bytes);

    for table in tables {
        let store = TableStore::new(Arc::clone(&client), table.as_str());
        store
            .ready()
            .await
            .with_context(|| format!("failed to load {table}"))?;
        cache.set(table.clone(), store.data().to_vec(), None);
    }

    let (cached, evicted): (Vec<String>, Vec<String>) =
        tables.iter().cloned().partition(|table| cache.contains(table));
    let output = CacheOutput {
        cached,
        evicted,
        stats: cache.stats(),
    };

    match format {
        OutputFormat::Text => {
            println!(
                "{} entr(ies), {} of {} bytes ({:.1}%)",
                output.stats.entry_count,
                output.stats.cache_size,
                output.stats.max_cache_size,
                output.stats.utilization_percent
            );
            for table in &output.cached {
                println!("  cached:  {table}");
            }
            for table in &output.evicted {
                println!("  evicted: {table}");
            }
        }
        OutputFormat::Json => print_json(&output)?,
    }

    Ok(())
}
