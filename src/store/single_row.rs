//! Single-row store: one row per owning key, such as per-user settings.
//!
//! The store runs `table where <owner_field> = owner limit 1`. Fields can be
//! read and written by name. Two write paths exist:
//!
//! - [`SingleRowStore::set_field`] awaits persistence and returns the result.
//! - [`SingleRowStore::set`] applies the value to a local optimistic overlay
//!   and persists in the background. The overlay entry is dropped once the
//!   write lands; on failure it is rolled back and a [`WriteFailure`] is
//!   broadcast. The returned [`PendingWrite`] may be awaited or dropped.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::{StoreError, StoreResult};
use crate::sync::{
    validate_field_name, Filter, Query, QueryState, Row, RowId, SyncClient, ID_FIELD,
};

/// Default owning-key field.
pub const OWNER_FIELD: &str = "userId";

/// Names that belong to the store itself rather than to the row.
///
/// Dynamic reads of these names return store state, and they can never be
/// written as row fields.
pub const RESERVED_KEYS: &[&str] = &[
    "data",
    "exists",
    "isLoading",
    "error",
    "query",
    "initialize",
    "updateProperty",
    "updateProperties",
    "reset",
    "delete",
    "getProperty",
    "hasProperty",
];

/// Generator for a fresh default row (without `id` or owner key).
pub type DefaultRow = Arc<dyn Fn() -> Row + Send + Sync>;

const FAILURE_CHANNEL_SIZE: usize = 64;

/// A background write that failed and was rolled back.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub field: String,
    pub value: Value,
    pub error: StoreError,
}

/// Handle to a write started by [`SingleRowStore::set`].
///
/// Dropping it leaves the write running.
#[derive(Debug)]
pub struct PendingWrite {
    inner: PendingInner,
}

#[derive(Debug)]
enum PendingInner {
    Spawned(JoinHandle<StoreResult<()>>),
    Rejected(StoreError),
}

impl PendingWrite {
    /// Wait for the write to be persisted.
    pub async fn wait(self) -> StoreResult<()> {
        match self.inner {
            PendingInner::Spawned(handle) => handle.await?,
            PendingInner::Rejected(err) => Err(err),
        }
    }

    /// True when the write was rejected before it started.
    pub fn is_rejected(&self) -> bool {
        matches!(self.inner, PendingInner::Rejected(_))
    }
}

struct PendingValue {
    generation: u64,
    value: Value,
}

struct Shared<C: ?Sized> {
    client: Arc<C>,
    table: String,
    owner_field: String,
    owner: Value,
    defaults: Option<DefaultRow>,
    query: Query,
    state: watch::Receiver<QueryState>,
    overlay: Mutex<HashMap<String, PendingValue>>,
    generation: AtomicU64,
    init_lock: tokio::sync::Mutex<()>,
    failures: broadcast::Sender<WriteFailure>,
}

/// Builder for [`SingleRowStore`].
pub struct SingleRowStoreBuilder {
    table: String,
    owner_field: String,
    owner: Value,
    defaults: Option<DefaultRow>,
}

impl SingleRowStoreBuilder {
    /// Use a different owning-key field than `userId`.
    #[must_use]
    pub fn owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = field.into();
        self
    }

    /// Supply a default-row generator, enabling lazy initialization.
    #[must_use]
    pub fn defaults<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Row + Send + Sync + 'static,
    {
        self.defaults = Some(Arc::new(generator));
        self
    }

    pub fn build<C: SyncClient + ?Sized>(self, client: Arc<C>) -> SingleRowStore<C> {
        let query = Query::table(self.table.clone())
            .where_eq(self.owner_field.clone(), self.owner.clone())
            .limit(1);
        let state = client.watch(query.clone());
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_SIZE);

        SingleRowStore {
            shared: Arc::new(Shared {
                client,
                table: self.table,
                owner_field: self.owner_field,
                owner: self.owner,
                defaults: self.defaults,
                query,
                state,
                overlay: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                init_lock: tokio::sync::Mutex::new(()),
                failures,
            }),
        }
    }
}

/// Store for exactly one row scoped to an owning key.
pub struct SingleRowStore<C: ?Sized> {
    shared: Arc<Shared<C>>,
}

impl<C: ?Sized> Clone for SingleRowStore<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl SingleRowStore<()> {
    /// Start building a store for `table`, owned by `owner`.
    pub fn builder(table: impl Into<String>, owner: impl Into<Value>) -> SingleRowStoreBuilder {
        SingleRowStoreBuilder {
            table: table.into(),
            owner_field: OWNER_FIELD.to_string(),
            owner: owner.into(),
            defaults: None,
        }
    }
}

impl<C: SyncClient + ?Sized> SingleRowStore<C> {
    pub fn table(&self) -> &str {
        &self.shared.table
    }

    pub fn owner(&self) -> &Value {
        &self.shared.owner
    }

    pub fn query(&self) -> &Query {
        &self.shared.query
    }

    /// The row with pending optimistic writes applied.
    pub fn row(&self) -> Option<Row> {
        self.shared.row()
    }

    /// The row as last published by the client, without pending writes.
    pub fn confirmed_row(&self) -> Option<Row> {
        self.shared.confirmed_row()
    }

    pub fn exists(&self) -> bool {
        self.shared.state.borrow().data.first().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn error(&self) -> Option<StoreError> {
        self.shared.state.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.shared.state.clone()
    }

    /// Failures of background writes started by [`set`](Self::set).
    pub fn write_failures(&self) -> broadcast::Receiver<WriteFailure> {
        self.shared.failures.subscribe()
    }

    /// Number of optimistic writes not yet confirmed or rolled back.
    pub fn pending_writes(&self) -> usize {
        self.shared.overlay.lock().len()
    }

    /// Wait until the first load finishes.
    pub async fn ready(&self) -> StoreResult<()> {
        self.shared.ready().await
    }

    /// Create the row from defaults if it does not exist yet.
    ///
    /// Idempotent: with a row present this is a no-op success. Without a
    /// row and without a default generator it fails with `NotFound`.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.shared.initialize().await
    }

    pub async fn update_property(&self, key: &str, value: Value) -> StoreResult<()> {
        self.shared
            .update_properties(Row::new().with(key, value))
            .await
    }

    pub async fn update_properties(&self, updates: Row) -> StoreResult<()> {
        self.shared.update_properties(updates).await
    }

    /// Overwrite the row with freshly generated defaults.
    pub async fn reset(&self) -> StoreResult<()> {
        self.shared.reset().await
    }

    pub async fn delete(&self) -> StoreResult<()> {
        self.shared.delete().await
    }

    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.row().and_then(|row| row.get(key).cloned())
    }

    pub fn has_property(&self, key: &str, value: &Value) -> bool {
        self.row().and_then(|row| row.get(key).cloned()).as_ref() == Some(value)
    }

    /// Read one field as a typed value. `None` when absent or of another type.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_property(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Deserialize the whole row into `T`.
    pub fn typed<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        self.row()
            .map(|row| serde_json::from_value(row.into_value()))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Dynamic read: store state for reserved names, otherwise the row field.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "exists" => Some(Value::Bool(self.exists())),
            "isLoading" => Some(Value::Bool(self.is_loading())),
            "error" => Some(
                self.error()
                    .map_or(Value::Null, |err| Value::String(err.to_string())),
            ),
            "data" => Some(self.row().map_or(Value::Null, Row::into_value)),
            _ if RESERVED_KEYS.contains(&name) => None,
            _ => self.get_property(name),
        }
    }

    /// Write a field and wait for it to be persisted.
    pub async fn set_field(&self, name: &str, value: Value) -> StoreResult<()> {
        self.shared.check_writable(name)?;
        self.update_property(name, value).await
    }

    /// Write a field without waiting.
    ///
    /// The value is visible through [`row`](Self::row) and
    /// [`get`](Self::get) immediately. Must be called inside a tokio runtime.
    pub fn set(&self, name: &str, value: Value) -> PendingWrite {
        if let Err(err) = self.shared.check_writable(name) {
            tracing::warn!(table = %self.shared.table, field = name, error = %err, "Rejected field write");
            return PendingWrite {
                inner: PendingInner::Rejected(err),
            };
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let err = StoreError::Unknown("field writes need a tokio runtime".into());
            tracing::warn!(table = %self.shared.table, field = name, error = %err, "Rejected field write");
            return PendingWrite {
                inner: PendingInner::Rejected(err),
            };
        };

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.overlay.lock().insert(
            name.to_string(),
            PendingValue {
                generation,
                value: value.clone(),
            },
        );

        let shared = Arc::clone(&self.shared);
        let field = name.to_string();
        let handle = runtime.spawn(async move {
            let result = shared
                .update_properties(Row::new().with(field.clone(), value.clone()))
                .await;
            shared.settle(&field, generation);
            if let Err(err) = &result {
                tracing::warn!(
                    table = %shared.table,
                    field = %field,
                    error = %err,
                    "Background write failed, rolled back"
                );
                let _ = shared.failures.send(WriteFailure {
                    field,
                    value,
                    error: err.clone(),
                });
            }
            result
        });

        PendingWrite {
            inner: PendingInner::Spawned(handle),
        }
    }

    /// Store names merged with the row's field names.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = RESERVED_KEYS.iter().map(|k| (*k).to_string()).collect();
        if let Some(row) = self.row() {
            keys.extend(row.keys().filter(|k| !RESERVED_KEYS.contains(&k.as_str())).cloned());
        }
        keys
    }

    pub fn contains_key(&self, name: &str) -> bool {
        RESERVED_KEYS.contains(&name) || self.row().is_some_and(|row| row.contains_key(name))
    }
}

impl<C: SyncClient + ?Sized> Shared<C> {
    fn confirmed_row(&self) -> Option<Row> {
        self.state.borrow().data.first().cloned()
    }

    fn row(&self) -> Option<Row> {
        let mut row = self.confirmed_row()?;
        for (field, pending) in self.overlay.lock().iter() {
            row.insert(field.clone(), pending.value.clone());
        }
        Some(row)
    }

    /// Drop the overlay entry for `field` unless a newer write replaced it.
    fn settle(&self, field: &str, generation: u64) {
        let mut overlay = self.overlay.lock();
        if overlay
            .get(field)
            .is_some_and(|pending| pending.generation == generation)
        {
            overlay.remove(field);
        }
    }

    async fn ready(&self) -> StoreResult<()> {
        let mut state = self.state.clone();
        let error = state
            .wait_for(|s| !s.loading)
            .await
            .map_err(|_| StoreError::Network("sync client dropped the query".into()))?
            .error
            .clone();
        error.map_or(Ok(()), Err)
    }

    fn check_writable(&self, name: &str) -> StoreResult<()> {
        validate_field_name(name)?;
        if RESERVED_KEYS.contains(&name) {
            return Err(StoreError::Validation(format!(
                "{name} is a store property and cannot be written"
            )));
        }
        if name == ID_FIELD || name == self.owner_field {
            return Err(StoreError::Validation(format!("{name} is read-only")));
        }
        Ok(())
    }

    fn missing(&self) -> StoreError {
        StoreError::not_found(
            self.table.clone(),
            Filter::all()
                .eq(self.owner_field.clone(), self.owner.clone())
                .to_string(),
        )
    }

    fn logged(&self, op: &'static str, err: StoreError) -> StoreError {
        tracing::error!(table = %self.table, owner = %self.owner, op, kind = %err.kind(), error = %err, "Single-row operation failed");
        err
    }

    fn default_row(&self) -> Option<Row> {
        self.defaults.as_ref().map(|generate| {
            let mut row = generate();
            row.remove(ID_FIELD);
            row.remove(&self.owner_field);
            row
        })
    }

    async fn initialize(&self) -> StoreResult<()> {
        self.ready().await?;
        let _guard = self.init_lock.lock().await;
        if self.confirmed_row().is_some() {
            return Ok(());
        }
        let Some(mut row) = self.default_row() else {
            return Err(self.logged("initialize", self.missing()));
        };
        row.insert(self.owner_field.clone(), self.owner.clone());
        self.client
            .insert(&self.table, row)
            .await
            .map_err(|err| self.logged("initialize", err))?;
        tracing::debug!(table = %self.table, owner = %self.owner, "Initialized row from defaults");
        Ok(())
    }

    /// The current row id, initializing from defaults when allowed.
    async fn row_id(&self, op: &'static str) -> StoreResult<RowId> {
        self.ready().await?;
        if self.confirmed_row().is_none() {
            if self.defaults.is_none() {
                return Err(self.logged(op, self.missing()));
            }
            self.initialize().await?;
        }
        self.confirmed_row()
            .and_then(|row| row.id().map(str::to_string))
            .ok_or_else(|| self.logged(op, self.missing()))
    }

    async fn update_properties(&self, updates: Row) -> StoreResult<()> {
        for field in updates.keys() {
            self.check_writable(field)
                .map_err(|err| self.logged("update_properties", err))?;
        }
        let id = self.row_id("update_properties").await?;
        self.apply(&id, updates, "update_properties").await
    }

    async fn apply(&self, id: &str, updates: Row, op: &'static str) -> StoreResult<()> {
        let changed = self
            .client
            .update(&self.table, &Filter::id(id), updates)
            .await
            .map_err(|err| self.logged(op, err))?;
        if changed == 0 {
            return Err(self.logged(op, self.missing()));
        }
        Ok(())
    }

    async fn reset(&self) -> StoreResult<()> {
        self.ready().await?;
        let Some(id) = self
            .confirmed_row()
            .and_then(|row| row.id().map(str::to_string))
        else {
            return Err(self.logged("reset", self.missing()));
        };
        let Some(defaults) = self.default_row() else {
            let err = StoreError::Validation(format!("{} has no default row", self.table));
            return Err(self.logged("reset", err));
        };
        self.apply(&id, defaults, "reset").await
    }

    async fn delete(&self) -> StoreResult<()> {
        self.ready().await?;
        let Some(id) = self
            .confirmed_row()
            .and_then(|row| row.id().map(str::to_string))
        else {
            return Err(self.logged("delete", self.missing()));
        };
        let removed = self
            .client
            .delete(&self.table, &Filter::id(&id))
            .await
            .map_err(|err| self.logged("delete", err))?;
        if removed == 0 {
            return Err(self.logged("delete", self.missing()));
        }
        Ok(())
    }
}
