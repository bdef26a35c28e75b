//! Table row commands: list, add, update, remove.

use anyhow::{bail, Context, Result};
use dealflow::store::TableStore;
use dealflow::sync::{Query, Row, SqliteClient};
use serde::Serialize;
use std::sync::Arc;

use super::{parse_filter, parse_row, print_json};
use crate::OutputFormat;

#[derive(Serialize)]
struct RowsOutput<'a> {
    table: &'a str,
    rows: &'a [Row],
    total: usize,
}

#[derive(Serialize)]
struct AddOutput<'a> {
    table: &'a str,
    id: String,
}

#[derive(Serialize)]
struct RemoveOutput<'a> {
    table: &'a str,
    removed: Vec<&'a str>,
    missing: Vec<&'a str>,
}

pub async fn list(
    client: Arc<SqliteClient>,
    table: &str,
    filters: &[String],
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut query = Query::table(table);
    for raw in filters {
        let (field, value) = parse_filter(raw)?;
        query = query.where_eq(field, value);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let store = TableStore::with_query(client, query);
    store.ready().await.context("failed to load rows")?;
    let rows = store.data();

    match format {
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No rows found in '{table}'.");
            } else {
                for row in rows.iter() {
                    println!("{}", serde_json::to_string(row)?);
                }
                println!();
                println!("Total: {} row(s)", rows.len());
            }
        }
        OutputFormat::Json => print_json(&RowsOutput {
            table,
            rows: &rows,
            total: rows.len(),
        })?,
    }

    Ok(())
}

pub async fn add(
    client: Arc<SqliteClient>,
    table: &str,
    json: &str,
    format: OutputFormat,
) -> Result<()> {
    let row = parse_row(json)?;
    let store = TableStore::new(client, table);
    let id = store.add(row).await.context("insert failed")?;

    match format {
        OutputFormat::Text => println!("Added row {id} to '{table}'"),
        OutputFormat::Json => print_json(&AddOutput { table, id })?,
    }
    Ok(())
}

pub async fn update(
    client: Arc<SqliteClient>,
    table: &str,
    id: &str,
    json: &str,
    format: OutputFormat,
) -> Result<()> {
    let updates = parse_row(json)?;
    let store = TableStore::new(client, table);
    store.update(id, updates).await.context("update failed")?;

    match format {
        OutputFormat::Text => println!("Updated row {id} in '{table}'"),
        OutputFormat::Json => match store.find_by_id(id) {
            Some(row) => print_json(&row)?,
            None => print_json(&serde_json::json!({ "table": table, "id": id }))?,
        },
    }
    Ok(())
}

pub async fn remove(
    client: Arc<SqliteClient>,
    table: &str,
    ids: &[String],
    format: OutputFormat,
) -> Result<()> {
    let store = TableStore::new(client, table);
    let outcome = store.remove_many(ids).await;

    let mut output = RemoveOutput {
        table,
        removed: Vec::new(),
        missing: Vec::new(),
    };
    for (id, result) in ids.iter().zip(&outcome.results) {
        match result {
            Ok(()) => output.removed.push(id),
            Err(err) if err.kind() == dealflow::ErrorKind::NotFound => output.missing.push(id),
            Err(err) => bail!("failed to remove {id}: {err}"),
        }
    }

    match format {
        OutputFormat::Text => {
            for id in &output.removed {
                println!("Removed {id}");
            }
            for id in &output.missing {
                println!("Not found: {id}");
            }
        }
        OutputFormat::Json => print_json(&output)?,
    }

    if !output.missing.is_empty() {
        bail!("{} of {} row(s) not found", output.missing.len(), ids.len());
    }
    Ok(())
}
