//! Row-level SQL over the `rows` table.
//!
//! Filters are pushed into SQL as `json_extract(data, '$."field"') IS ?`,
//! so a missing field matches `null` the same way the in-memory filter does.
//! Field names are spliced into the JSON path, so every helper that builds
//! a filter rejects names that are not plain identifiers.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

use super::StorageError;
use crate::sync::{validate_field_name, Filter, Query, Row};

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Build `tbl = ?1 AND ...` with its parameters.
fn where_clause(table: &str, filter: &Filter) -> Result<(String, Vec<SqlValue>), StorageError> {
    let mut sql = String::from("tbl = ?1");
    let mut params = vec![SqlValue::Text(table.to_string())];
    for (field, value) in filter.conditions() {
        if validate_field_name(field).is_err() {
            return Err(StorageError::InvalidField(field.clone()));
        }
        params.push(to_sql(value));
        sql.push_str(&format!(
            " AND json_extract(data, '$.\"{field}\"') IS ?{}",
            params.len()
        ));
    }
    Ok((sql, params))
}

fn decode(data: &str) -> Result<Row, StorageError> {
    Ok(serde_json::from_str(data)?)
}

/// Run a query, returning rows in insertion order.
pub fn select(conn: &Connection, query: &Query) -> Result<Vec<Row>, StorageError> {
    let (clause, params) = where_clause(&query.table, &query.filter)?;
    let limit = query
        .limit
        .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    let sql = format!("SELECT data FROM rows WHERE {clause} ORDER BY rowid LIMIT {limit}");

    let mut stmt = conn.prepare_cached(&sql)?;
    let encoded = stmt
        .query_map(params_from_iter(params), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    encoded.iter().map(|data| decode(data)).collect()
}

/// Insert a row that already carries its id.
///
/// Fails with a constraint violation when `(table, id)` exists.
pub fn insert(
    conn: &Connection,
    table: &str,
    id: &str,
    row: &Row,
    now: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO rows (tbl, id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![table, id, serde_json::to_string(row)?, now],
    )?;
    Ok(())
}

/// Merge `set` into every matching row inside one transaction.
///
/// # Returns
///
/// The number of rows changed.
pub fn update(
    conn: &mut Connection,
    table: &str,
    filter: &Filter,
    set: &Row,
    now: i64,
) -> Result<u64, StorageError> {
    let tx = conn.transaction()?;
    let (clause, params) = where_clause(table, filter)?;

    let matching = {
        let mut stmt = tx.prepare(&format!("SELECT id, data FROM rows WHERE {clause}"))?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    for (id, data) in &matching {
        let mut row = decode(data)?;
        row.merge(set);
        tx.execute(
            "UPDATE rows SET data = ?1, updated_at = ?2 WHERE tbl = ?3 AND id = ?4",
            params![serde_json::to_string(&row)?, now, table, id],
        )?;
    }

    tx.commit()?;
    Ok(matching.len() as u64)
}

/// Delete every matching row.
pub fn delete(conn: &Connection, table: &str, filter: &Filter) -> Result<u64, StorageError> {
    let (clause, params) = where_clause(table, filter)?;
    let removed = conn.execute(
        &format!("DELETE FROM rows WHERE {clause}"),
        params_from_iter(params),
    )?;
    Ok(removed as u64)
}

/// Fetch one row by id.
pub fn get(conn: &Connection, table: &str, id: &str) -> Result<Option<Row>, StorageError> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM rows WHERE tbl = ?1 AND id = ?2",
            params![table, id],
            |row| row.get(0),
        )
        .optional()?;
    data.as_deref().map(decode).transpose()
}
