//! Table store: a live view over one table plus mutation methods.
//!
//! Reads come from the latest published snapshot and are recomputed on each
//! call. Mutations log their failures and return them as [`StoreError`]s.
//! Batch mutations run concurrently and are not transactional: a partial
//! failure leaves the successful operations applied.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::error::{StoreError, StoreResult};
use crate::sync::{Filter, Query, QueryState, Row, RowId, SyncClient, ID_FIELD};

/// Per-item results of a batch mutation, in input order.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: Vec<StoreResult<T>>,
}

impl<T> BatchOutcome<T> {
    /// True when every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(Result::is_ok)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Failed items with their input index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &StoreError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Collapse into the successful values, or the first failure.
    pub fn into_result(self) -> StoreResult<Vec<T>> {
        self.results.into_iter().collect()
    }
}

/// Live view over the rows of one table.
pub struct TableStore<C: ?Sized> {
    client: Arc<C>,
    table: String,
    query: Query,
    state: watch::Receiver<QueryState>,
}

impl<C: ?Sized> Clone for TableStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            table: self.table.clone(),
            query: self.query.clone(),
            state: self.state.clone(),
        }
    }
}

impl<C: SyncClient + ?Sized> TableStore<C> {
    /// Bind a store to every row of `table`.
    pub fn new(client: Arc<C>, table: impl Into<String>) -> Self {
        Self::with_query(client, Query::table(table))
    }

    /// Bind a store to a custom query. Mutations target the query's table.
    pub fn with_query(client: Arc<C>, query: Query) -> Self {
        let state = client.watch(query.clone());
        Self {
            client,
            table: query.table.clone(),
            query,
            state,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Current rows.
    pub fn data(&self) -> Arc<[Row]> {
        Arc::clone(&self.state.borrow().data)
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<StoreError> {
        self.state.borrow().error.clone()
    }

    /// A receiver that observes every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.clone()
    }

    /// Snapshots as a stream, starting with the current one.
    pub fn stream(&self) -> WatchStream<QueryState> {
        WatchStream::new(self.state.clone())
    }

    /// Wait until the first load finishes. Returns the load error, if any.
    pub async fn ready(&self) -> StoreResult<()> {
        let mut state = self.state.clone();
        let error = state
            .wait_for(|s| !s.loading)
            .await
            .map_err(|_| StoreError::Network("sync client dropped the query".into()))?
            .error
            .clone();
        error.map_or(Ok(()), Err)
    }

    /// Wait for the next snapshot. Returns false once the client is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    pub fn find_by_id(&self, id: &str) -> Option<Row> {
        self.state
            .borrow()
            .data
            .iter()
            .find(|row| row.id() == Some(id))
            .cloned()
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<Row>
    where
        P: Fn(&Row) -> bool,
    {
        self.state
            .borrow()
            .data
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.state.borrow().data.len()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.state.borrow().data.iter().any(|row| row.id() == Some(id))
    }

    /// Insert a record. Any `id` it carries is dropped; the client assigns one.
    pub async fn add(&self, mut record: Row) -> StoreResult<RowId> {
        record.remove(ID_FIELD);
        self.client
            .insert(&self.table, record)
            .await
            .map_err(|err| self.logged("add", err))
    }

    /// Merge `updates` into the row with the given id.
    pub async fn update(&self, id: &str, updates: Row) -> StoreResult<()> {
        if updates.contains_key(ID_FIELD) {
            let err = StoreError::Validation("row ids cannot be updated".into());
            return Err(self.logged("update", err));
        }
        let changed = self
            .client
            .update(&self.table, &Filter::id(id), updates)
            .await
            .map_err(|err| self.logged("update", err))?;
        if changed == 0 {
            return Err(self.logged("update", self.missing(id)));
        }
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let removed = self
            .client
            .delete(&self.table, &Filter::id(id))
            .await
            .map_err(|err| self.logged("remove", err))?;
        if removed == 0 {
            return Err(self.logged("remove", self.missing(id)));
        }
        Ok(())
    }

    /// Insert several records concurrently. Best-effort, no rollback.
    pub async fn add_many<I>(&self, records: I) -> BatchOutcome<RowId>
    where
        I: IntoIterator<Item = Row>,
    {
        let results = join_all(records.into_iter().map(|record| self.add(record))).await;
        self.batch_outcome("add_many", results)
    }

    /// Remove several rows concurrently. Best-effort, no rollback.
    pub async fn remove_many<I, S>(&self, ids: I) -> BatchOutcome<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<S> = ids.into_iter().collect();
        let results = join_all(ids.iter().map(|id| self.remove(id.as_ref()))).await;
        self.batch_outcome("remove_many", results)
    }

    fn batch_outcome<T>(&self, op: &'static str, results: Vec<StoreResult<T>>) -> BatchOutcome<T> {
        let outcome = BatchOutcome { results };
        let failed = outcome.failures().count();
        if failed > 0 {
            tracing::warn!(
                table = %self.table,
                op,
                failed,
                total = outcome.len(),
                "Batch partially applied"
            );
        }
        outcome
    }

    fn missing(&self, id: &str) -> StoreError {
        StoreError::not_found(self.table.clone(), Filter::id(id).to_string())
    }

    fn logged(&self, op: &'static str, err: StoreError) -> StoreError {
        tracing::error!(table = %self.table, op, kind = %err.kind(), error = %err, "Store mutation failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryClient;
    use crate::ErrorKind;
    use serde_json::json;

    fn store() -> (Arc<MemoryClient>, TableStore<MemoryClient>) {
        let client = Arc::new(MemoryClient::new());
        let store = TableStore::new(Arc::clone(&client), "leads");
        (client, store)
    }

    #[tokio::test]
    async fn test_add_strips_caller_id() {
        let (_client, store) = store();
        let id = store
            .add(Row::new().with("id", "caller-chosen").with("company", "Acme"))
            .await
            .unwrap();

        assert_ne!(id, "caller-chosen");
        assert!(store.exists(&id));
        assert!(!store.exists("caller-chosen"));
    }

    #[tokio::test]
    async fn test_update_and_remove_missing_row() {
        let (_client, store) = store();
        let err = store
            .update("ghost", Row::new().with("status", "won"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.remove("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_rejects_id_change() {
        let (_client, store) = store();
        let id = store.add(Row::new()).await.unwrap();
        let err = store
            .update(&id, Row::new().with("id", "other"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_derived_views() {
        let (_client, store) = store();
        store
            .add_many(vec![
                Row::new().with("status", "new").with("value", 100),
                Row::new().with("status", "won").with("value", 900),
                Row::new().with("status", "new").with("value", 50),
            ])
            .await
            .into_result()
            .unwrap();

        assert_eq!(store.count(), 3);
        let open = store.filter(|row| row.get("status") == Some(&json!("new")));
        assert_eq!(open.len(), 2);

        let first = store.data()[0].clone();
        let id = first.id().unwrap();
        assert_eq!(store.find_by_id(id), Some(first.clone()));
        assert!(store.find_by_id("missing").is_none());
    }

    #[tokio::test]
    async fn test_custom_query_store() {
        let client = Arc::new(MemoryClient::new());
        let all = TableStore::new(Arc::clone(&client), "deals");
        let won = TableStore::with_query(
            Arc::clone(&client),
            Query::table("deals").where_eq("stage", "won"),
        );

        all.add(Row::new().with("stage", "open")).await.unwrap();
        won.add(Row::new().with("stage", "won")).await.unwrap();

        assert_eq!(all.count(), 2);
        assert_eq!(won.count(), 1);
    }

    #[tokio::test]
    async fn test_remove_many_reports_partial_failure() {
        let (_client, store) = store();
        let a = store.add(Row::new()).await.unwrap();
        let b = store.add(Row::new()).await.unwrap();

        let outcome = store.remove_many([a.as_str(), "ghost", b.as_str()]).await;
        assert!(!outcome.is_complete());
        assert_eq!(outcome.succeeded().count(), 2);
        let failures: Vec<_> = outcome.failures().map(|(i, e)| (i, e.kind())).collect();
        assert_eq!(failures, vec![(1, ErrorKind::NotFound)]);
        assert_eq!(store.count(), 0);
    }

    enum Step {
        Add(&'static str),
        Remove(&'static str),
        RemoveMany(&'static [&'static str]),
    }

    #[tokio::test]
    async fn test_add_remove_sequences_leave_net_rows() {
        use std::collections::HashMap;
        use Step::{Add, Remove, RemoveMany};

        // Labels never added stand for ids the store has never seen.
        fn id_of(ids: &HashMap<&str, RowId>, label: &str) -> RowId {
            ids.get(label).cloned().unwrap_or_else(|| label.to_string())
        }

        let cases: &[&[Step]] = &[
            &[Add("a"), Add("b"), Remove("a"), Add("c")],
            &[Add("a"), Remove("a"), Remove("a"), Add("b")],
            &[Add("a"), Add("b"), Add("c"), RemoveMany(&["c", "a"]), Add("d")],
            &[Add("a"), RemoveMany(&["a", "ghost", "a"]), Add("b"), Remove("b")],
            &[RemoveMany(&[]), Add("a"), Add("b"), RemoveMany(&["b"]), Add("c"), Remove("a")],
        ];

        for (case, steps) in cases.iter().enumerate() {
            let (_client, store) = store();
            let mut ids: HashMap<&str, RowId> = HashMap::new();
            let mut model: Vec<RowId> = Vec::new();

            for (i, step) in steps.iter().enumerate() {
                match step {
                    Add(label) => {
                        let id = store.add(Row::new().with("label", *label)).await.unwrap();
                        ids.insert(*label, id.clone());
                        model.push(id);
                    }
                    Remove(label) => {
                        let id = id_of(&ids, *label);
                        let expected = model.contains(&id);
                        let removed = store.remove(&id).await.is_ok();
                        assert_eq!(removed, expected, "case {case} step {i}");
                        model.retain(|m| *m != id);
                    }
                    RemoveMany(labels) => {
                        let batch: Vec<RowId> = labels.iter().map(|l| id_of(&ids, *l)).collect();
                        let outcome = store.remove_many(&batch).await;
                        for id in &batch {
                            model.retain(|m| m != id);
                        }
                        assert_eq!(outcome.results.len(), batch.len(), "case {case} step {i}");
                    }
                }

                let actual: Vec<RowId> = store
                    .data()
                    .iter()
                    .filter_map(|row| row.id().map(str::to_string))
                    .collect();
                assert_eq!(actual, model, "case {case} step {i}");
            }
        }
    }

    #[tokio::test]
    async fn test_offline_add_is_network_error() {
        let (client, store) = store();
        client.set_online(false);
        let err = store.add(Row::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(store.count(), 0);
    }
}
