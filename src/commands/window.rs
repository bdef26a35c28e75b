//! Virtual-scroll window command.

use anyhow::{Context, Result};
use dealflow::scroll::{ScrollItem, VirtualScrollConfig, VirtualScrollManager, VisibleRange};
use dealflow::store::TableStore;
use dealflow::sync::SqliteClient;
use serde::Serialize;
use std::sync::Arc;

use super::print_json;
use crate::OutputFormat;

#[derive(Serialize)]
struct WindowOutput<'a> {
    table: &'a str,
    total_items: usize,
    total_height: f64,
    range: VisibleRange,
    visible: Vec<&'a str>,
}

pub async fn run(
    client: Arc<SqliteClient>,
    table: &str,
    viewport: VirtualScrollConfig,
    scroll_top: f64,
    format: OutputFormat,
) -> Result<()> {
    let store = TableStore::new(client, table);
    store.ready().await.context("failed to load rows")?;

    let items: Vec<ScrollItem> = store
        .data()
        .iter()
        .filter_map(|row| {
            let id = row.id()?.to_string();
            Some(ScrollItem::new(id, row.clone().into_value()))
        })
        .collect();

    let mut manager = VirtualScrollManager::new(viewport);
    manager.set_items(items);
    manager.update_scroll_top(scroll_top);

    let output = WindowOutput {
        table,
        total_items: manager.items().len(),
        total_height: manager.total_height(),
        range: manager.visible_range(),
        visible: manager
            .visible_items()
            .iter()
            .map(|item| item.id.as_str())
            .collect(),
    };

    match format {
        OutputFormat::Text => {
            println!(
                "Items {}..={} of {} (total height {}px)",
                output.range.start, output.range.end, output.total_items, output.total_height
            );
            for id in &output.visible {
                println!("  {id}");
            }
        }
        OutputFormat::Json => print_json(&output)?,
    }

    Ok(())
}
