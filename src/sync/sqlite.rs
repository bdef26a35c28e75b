//! SQLite-backed sync client.
//!
//! - Blocking SQLite work runs on `spawn_blocking` with pooled connections
//! - A write gate (async mutex) serializes writers and their republish
//! - A live query registered while a write is in flight loads after it
//! - Queries with invalid field names never reach SQL

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::{
    rejected_query, Filter, LiveQueries, Query, QueryState, Row, RowId, SyncClient, ID_FIELD,
};
use crate::error::{StoreError, StoreResult};
use crate::storage::{rows, ConnectionPool, StorageError};
use crate::{generate_row_id, now_millis};

struct Inner {
    pool: ConnectionPool,
    live: LiveQueries,
    write_gate: Mutex<()>,
}

impl Inner {
    /// Republish every live query on `table` from the database.
    ///
    /// Without a connection every query on the table is marked failed, so
    /// waiters on the first load are released.
    fn publish(&self, table: &str) -> usize {
        match self.pool.get() {
            Ok(conn) => self.live.publish(table, |query| {
                rows::select(&conn, query).map_err(StoreError::from)
            }),
            Err(err) => {
                let err = StoreError::from(err);
                self.live.publish(table, |_| Err(err.clone()))
            }
        }
    }
}

/// Sync client persisting rows in a SQLite database file.
///
/// Cheap to clone; clones share the pool and live queries.
#[derive(Clone)]
pub struct SqliteClient {
    inner: Arc<Inner>,
}

impl SqliteClient {
    /// Open (or create) the database at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P, pool_size: u32) -> StoreResult<Self> {
        let pool = ConnectionPool::open(db_path, pool_size)?;
        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                live: LiveQueries::new(),
                write_gate: Mutex::new(()),
            }),
        })
    }

    /// Number of registered live queries.
    pub fn live_query_count(&self) -> usize {
        self.inner.live.len()
    }

    /// Fetch one row by id, bypassing live queries.
    pub async fn get(&self, table: &str, id: &str) -> StoreResult<Option<Row>> {
        let inner = Arc::clone(&self.inner);
        let (table, id) = (table.to_string(), id.to_string());
        tokio::task::spawn_blocking(move || -> Result<_, StorageError> {
            let conn = inner.pool.get()?;
            rows::get(&conn, &table, &id)
        })
        .await?
        .map_err(StoreError::from)
    }

    /// Run a write on the blocking pool under the write gate, then
    /// republish the table.
    async fn write<T, F>(&self, table: &str, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let _gate = self.inner.write_gate.lock().await;
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();

        tokio::task::spawn_blocking(move || -> StoreResult<T> {
            let result = {
                let mut conn = inner.pool.get()?;
                op(&mut *conn)?
            };
            let published = inner.publish(&table);
            tracing::trace!(table = %table, published, "Republished live queries");
            Ok(result)
        })
        .await?
    }
}

#[async_trait]
impl SyncClient for SqliteClient {
    fn watch(&self, query: Query) -> watch::Receiver<QueryState> {
        if let Err(err) = query.filter.validate() {
            return rejected_query(&query, err);
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return rejected_query(
                &query,
                StoreError::Unknown("live queries need a tokio runtime".into()),
            );
        };
        let receiver = self.inner.live.register(query.clone(), QueryState::loading());

        // The initial load waits for in-flight writes; any write that commits
        // after this load republishes the query anyway.
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            let _gate = inner.write_gate.lock().await;
            let loader = Arc::clone(&inner);
            let table = query.table.clone();
            let loaded = tokio::task::spawn_blocking(move || loader.publish(&table)).await;
            if let Err(err) = loaded {
                tracing::error!(table = %query.table, error = %err, "Initial load panicked");
            }
        });

        receiver
    }

    async fn insert(&self, table: &str, mut row: Row) -> StoreResult<RowId> {
        let id = match row.id() {
            Some(id) => id.to_string(),
            None => {
                let id = generate_row_id();
                row.insert(ID_FIELD, id.clone().into());
                id
            }
        };

        let owned_table = table.to_string();
        let row_id = id.clone();
        self.write(table, move |conn| {
            rows::insert(conn, &owned_table, &row_id, &row, now_millis())
        })
        .await?;
        tracing::debug!(table, id = %id, "Row inserted");
        Ok(id)
    }

    async fn update(&self, table: &str, filter: &Filter, set: Row) -> StoreResult<u64> {
        filter.validate()?;
        if set.contains_key(ID_FIELD) {
            return Err(StoreError::Validation("row ids cannot be updated".into()));
        }

        let owned_table = table.to_string();
        let filter = filter.clone();
        self.write(table, move |conn| {
            rows::update(conn, &owned_table, &filter, &set, now_millis())
        })
        .await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<u64> {
        filter.validate()?;

        let owned_table = table.to_string();
        let filter = filter.clone();
        self.write(table, move |conn| rows::delete(conn, &owned_table, &filter))
            .await
    }
}
