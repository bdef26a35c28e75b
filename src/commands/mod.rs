//! Subcommand implementations.

pub mod cache;
pub mod rows;
pub mod settings;
pub mod window;

use anyhow::{anyhow, Context, Result};
use dealflow::sync::Row;
use serde::Serialize;
use serde_json::Value;

/// Parse a command-line value as JSON, falling back to a plain string.
///
/// `dark` and `"dark"` both give the string `dark`; `true` and `42` keep
/// their JSON types.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a JSON object argument into a row.
pub fn parse_row(raw: &str) -> Result<Row> {
    let value: Value = serde_json::from_str(raw).context("row must be valid JSON")?;
    Ok(Row::from_value(value)?)
}

/// Parse a `field=value` filter argument.
pub fn parse_filter(raw: &str) -> Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("filter must look like field=value: {raw}"))?;
    Ok((field.trim().to_string(), parse_value(value)))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
