//! Settings command implementation.

use anyhow::{Context, Result};
use dealflow::store::user_settings_store;
use dealflow::sync::{Row, SqliteClient};
use serde_json::Value;
use std::sync::Arc;

use super::{parse_value, print_json};
use crate::{OutputFormat, SettingsAction};

pub async fn run(
    client: Arc<SqliteClient>,
    user: &str,
    action: SettingsAction,
    format: OutputFormat,
) -> Result<()> {
    let store = user_settings_store(client, user);
    store.ready().await.context("failed to load settings")?;

    match action {
        SettingsAction::Get { field: None } => match store.row() {
            Some(row) => match format {
                OutputFormat::Text => {
                    for (field, value) in row.iter() {
                        println!("{field:<20} {value}");
                    }
                }
                OutputFormat::Json => print_json(&row)?,
            },
            None => match format {
                OutputFormat::Text => println!("No settings stored for '{user}'."),
                OutputFormat::Json => print_json(&Value::Null)?,
            },
        },
        SettingsAction::Get { field: Some(field) } => {
            let value = store.get(&field).unwrap_or(Value::Null);
            match format {
                OutputFormat::Text => println!("{value}"),
                OutputFormat::Json => print_json(&value)?,
            }
        }
        SettingsAction::Set { field, value } => {
            let value = parse_value(&value);
            store
                .set_field(&field, value.clone())
                .await
                .with_context(|| format!("failed to set {field}"))?;
            report(format, &format!("Set {field} = {value}"), store.row().as_ref())?;
        }
        SettingsAction::Init => {
            store.initialize().await.context("initialize failed")?;
            report(format, &format!("Settings ready for '{user}'"), store.row().as_ref())?;
        }
        SettingsAction::Reset => {
            store.reset().await.context("reset failed")?;
            report(format, "Settings restored to defaults", store.row().as_ref())?;
        }
        SettingsAction::Delete => {
            store.delete().await.context("delete failed")?;
            report(format, &format!("Deleted settings for '{user}'"), None)?;
        }
    }

    Ok(())
}

fn report(format: OutputFormat, message: &str, row: Option<&Row>) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{message}"),
        OutputFormat::Json => print_json(&row)?,
    }
    Ok(())
}
