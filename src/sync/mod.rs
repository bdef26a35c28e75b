//! Sync client contract.
//!
//! Stores never own rows. They receive a [`SyncClient`] that holds the
//! authoritative data, run live queries against it, and submit mutations.
//!
//! Provides:
//! - [`Row`], [`Filter`], [`Query`] and [`QueryState`] value types
//! - The [`SyncClient`] trait
//! - [`MemoryClient`]: in-process client for tests and demos
//! - [`SqliteClient`]: SQLite-backed client

pub mod live;
pub mod memory;
pub mod sqlite;

pub use live::LiveQueries;
pub use memory::MemoryClient;
pub use sqlite::SqliteClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{StoreError, StoreResult};

/// Name of the identifier field every row carries.
pub const ID_FIELD: &str = "id";

/// Row identifier.
pub type RowId = String;

/// A single row: field name to JSON value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a row from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::Validation(format!(
                "row must be a JSON object, got {other}"
            ))),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// The row identifier, if the row has a string `id`.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Overwrite this row's fields with every field of `other`.
    pub fn merge(&mut self, other: &Row) {
        for (field, value) in &other.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Row {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Check that a field name is a plain identifier.
///
/// Field names end up inside SQL JSON paths, so anything else is rejected.
pub fn validate_field_name(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("invalid field name {name:?}")))
    }
}

/// Conjunction of field-equality conditions.
///
/// A missing field compares equal to `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match the row with the given identifier.
    pub fn id(id: &str) -> Self {
        Self::all().eq(ID_FIELD, id)
    }

    /// Add an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| row.get(field).unwrap_or(&Value::Null) == expected)
    }

    pub fn validate(&self) -> StoreResult<()> {
        self.conditions
            .iter()
            .try_for_each(|(field, _)| validate_field_name(field))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("all rows");
        }
        for (i, (field, value)) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{field} = {value}")?;
        }
        Ok(())
    }
}

/// A live query over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filter: Filter,
    pub limit: Option<usize>,
}

impl Query {
    /// Query every row of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::all(),
            limit: None,
        }
    }

    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = self.filter.eq(field, value);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the query over rows given in table order.
    pub fn evaluate<'a, I>(&self, rows: I) -> Vec<Row>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let matching = rows.into_iter().filter(|row| self.filter.matches(row));
        match self.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        }
    }
}

/// Snapshot of a live query.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub data: Arc<[Row]>,
    pub loading: bool,
    pub error: Option<StoreError>,
}

impl QueryState {
    /// Initial state before the first load completes.
    pub fn loading() -> Self {
        Self {
            data: Arc::from(Vec::new()),
            loading: true,
            error: None,
        }
    }

    pub fn loaded(rows: Vec<Row>) -> Self {
        Self {
            data: Arc::from(rows),
            loading: false,
            error: None,
        }
    }

    /// Keep the previous rows and record the failure.
    pub fn failed(previous: &QueryState, error: StoreError) -> Self {
        Self {
            data: Arc::clone(&previous.data),
            loading: false,
            error: Some(error),
        }
    }
}

impl Default for QueryState {
    fn default() -> Self {
        Self::loading()
    }
}

/// A snapshot channel for a query that cannot run. It holds `error` and
/// never changes; the query is not registered for republishing.
pub(crate) fn rejected_query(query: &Query, error: StoreError) -> watch::Receiver<QueryState> {
    tracing::warn!(table = %query.table, error = %error, "Rejected live query");
    let (_, receiver) = watch::channel(QueryState::failed(&QueryState::loading(), error));
    receiver
}

/// The query/mutation surface a store receives from its environment.
///
/// Implementations must republish every live query on a table before a
/// mutation of that table returns, so a caller that awaited a mutation sees
/// its effect in the next read.
#[async_trait]
pub trait SyncClient: Send + Sync + 'static {
    /// Start a live query. Never blocks; the first snapshot may still be
    /// loading. A query with an invalid filter field yields a settled
    /// `Validation` failure instead of rows.
    fn watch(&self, query: Query) -> watch::Receiver<QueryState>;

    /// Insert a row, assigning a UUIDv7 `id` when the row has none.
    async fn insert(&self, table: &str, row: Row) -> StoreResult<RowId>;

    /// Merge `set` into every row matching `filter`. Returns the number of
    /// rows changed.
    async fn update(&self, table: &str, filter: &Filter, set: Row) -> StoreResult<u64>;

    /// Delete every row matching `filter`. Returns the number of rows removed.
    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead(id: &str, owner: &str) -> Row {
        Row::new().with("id", id).with("owner", owner)
    }

    #[test]
    fn test_row_from_non_object_rejected() {
        let err = Row::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_row_merge_overwrites() {
        let mut row = Row::new().with("theme", "light").with("language", "en");
        row.merge(&Row::new().with("theme", "dark"));
        assert_eq!(row.get("theme"), Some(&json!("dark")));
        assert_eq!(row.get("language"), Some(&json!("en")));
    }

    #[test]
    fn test_filter_missing_field_matches_null() {
        let row = Row::new().with("id", "a");
        assert!(Filter::all().eq("closedAt", Value::Null).matches(&row));
        assert!(!Filter::all().eq("closedAt", 5).matches(&row));
    }

    #[test]
    fn test_field_name_validation() {
        assert!(validate_field_name("userId").is_ok());
        assert!(validate_field_name("_private").is_ok());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name("1st").is_err());
        assert!(validate_field_name("a.b").is_err());
        assert!(Filter::all().eq("x'--", 1).validate().is_err());
    }

    #[test]
    fn test_query_filter_and_limit() {
        let rows = vec![lead("1", "ann"), lead("2", "bob"), lead("3", "ann")];
        let query = Query::table("leads").where_eq("owner", "ann");
        let ids: Vec<_> = query
            .evaluate(&rows)
            .iter()
            .map(|r| r.id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);

        let limited = query.limit(1).evaluate(&rows);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id(), Some("1"));
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::all().to_string(), "all rows");
        assert_eq!(
            Filter::id("x").eq("userId", "u").to_string(),
            "id = \"x\" and userId = \"u\""
        );
    }
}
