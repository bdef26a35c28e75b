//! In-process sync client.
//!
//! Keeps every table in an insertion-ordered map behind a mutex. Mutations
//! publish to live queries before returning. An online switch lets tests and
//! demos exercise the network failure path.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use super::{
    rejected_query, Filter, LiveQueries, Query, QueryState, Row, RowId, SyncClient, ID_FIELD,
};
use crate::error::{StoreError, StoreResult};
use crate::generate_row_id;

type Table = IndexMap<RowId, Row>;

/// Sync client holding all rows in memory.
pub struct MemoryClient {
    tables: Mutex<HashMap<String, Table>>,
    live: LiveQueries,
    online: AtomicBool,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            live: LiveQueries::new(),
            online: AtomicBool::new(true),
        }
    }

    /// Toggle connectivity. While offline every mutation fails with
    /// [`StoreError::Network`]; live queries keep their last snapshot.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        tracing::debug!(online, "Memory client connectivity changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, IndexMap::len)
    }

    /// Number of registered live queries.
    pub fn live_query_count(&self) -> usize {
        self.live.len()
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::Network("memory client is offline".into()))
        }
    }

    /// Publish `table` to live queries. Called with the tables lock held so
    /// a concurrent `watch` cannot register between commit and publish.
    fn publish(&self, tables: &HashMap<String, Table>, table: &str) {
        self.live.publish(table, |query| Ok(evaluate(tables, query)));
    }
}

fn evaluate(tables: &HashMap<String, Table>, query: &Query) -> Vec<Row> {
    tables
        .get(&query.table)
        .map(|table| query.evaluate(table.values()))
        .unwrap_or_default()
}

#[async_trait]
impl SyncClient for MemoryClient {
    fn watch(&self, query: Query) -> watch::Receiver<QueryState> {
        if let Err(err) = query.filter.validate() {
            return rejected_query(&query, err);
        }
        let tables = self.tables.lock();
        let rows = evaluate(&tables, &query);
        self.live.register(query, QueryState::loaded(rows))
    }

    async fn insert(&self, table: &str, mut row: Row) -> StoreResult<RowId> {
        self.ensure_online()?;
        let id = match row.id() {
            Some(id) => id.to_string(),
            None => {
                let id = generate_row_id();
                row.insert(ID_FIELD, id.clone().into());
                id
            }
        };

        let mut tables = self.tables.lock();
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(StoreError::Conflict(format!(
                "{table} already has a row with id {id}"
            )));
        }
        rows.insert(id.clone(), row);

        self.publish(&tables, table);
        Ok(id)
    }

    async fn update(&self, table: &str, filter: &Filter, set: Row) -> StoreResult<u64> {
        self.ensure_online()?;
        filter.validate()?;
        if set.contains_key(ID_FIELD) {
            return Err(StoreError::Validation("row ids cannot be updated".into()));
        }

        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut changed = 0;
        for row in rows.values_mut().filter(|row| filter.matches(row)) {
            row.merge(&set);
            changed += 1;
        }

        if changed > 0 {
            self.publish(&tables, table);
        }
        Ok(changed)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<u64> {
        self.ensure_online()?;
        filter.validate()?;

        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, row| !filter.matches(row));
        let removed = (before - rows.len()) as u64;

        if removed > 0 {
            self.publish(&tables, table);
        }
        Ok(removed)
    }
}
