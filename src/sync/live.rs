//! Registry of live queries.
//!
//! - tokio::sync::watch per query: readers only ever need the latest snapshot
//! - Republish per table after every committed mutation
//! - Queries whose receivers are all dropped are pruned on the next publish

use parking_lot::Mutex;
use tokio::sync::watch::{self, Receiver, Sender};

use super::{Query, QueryState, Row};
use crate::error::StoreResult;

struct LiveQuery {
    query: Query,
    sender: Sender<QueryState>,
}

/// Live queries shared by a client's read and write paths.
#[derive(Default)]
pub struct LiveQueries {
    queries: Mutex<Vec<LiveQuery>>,
}

impl LiveQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live query with its first snapshot.
    ///
    /// Returns the receiver handed to the store.
    pub fn register(&self, query: Query, initial: QueryState) -> Receiver<QueryState> {
        let (sender, receiver) = watch::channel(initial);
        self.queries.lock().push(LiveQuery { query, sender });
        receiver
    }

    /// Re-evaluate every live query on `table` and publish the results.
    ///
    /// `load` runs once per live query. A failed load keeps the previous
    /// rows and records the error in the published state.
    ///
    /// # Returns
    ///
    /// The number of live queries that received a new snapshot.
    pub fn publish<F>(&self, table: &str, mut load: F) -> usize
    where
        F: FnMut(&Query) -> StoreResult<Vec<Row>>,
    {
        let mut queries = self.queries.lock();
        queries.retain(|live| !live.sender.is_closed());

        let mut published = 0;
        for live in queries.iter().filter(|live| live.query.table == table) {
            let state = match load(&live.query) {
                Ok(rows) => QueryState::loaded(rows),
                Err(err) => {
                    tracing::warn!(table, error = %err, "Live query refresh failed");
                    QueryState::failed(&live.sender.borrow(), err)
                }
            };
            live.sender.send_replace(state);
            published += 1;
        }
        published
    }

    /// Get the number of live queries still registered.
    pub fn len(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_publish_reaches_matching_table_only() {
        let live = LiveQueries::new();
        let leads = live.register(Query::table("leads"), QueryState::loaded(vec![]));
        let deals = live.register(Query::table("deals"), QueryState::loaded(vec![]));

        let count = live.publish("leads", |_| Ok(vec![Row::new().with("id", "1")]));
        assert_eq!(count, 1);

        assert_eq!(leads.borrow().data.len(), 1);
        assert!(deals.borrow().data.is_empty());
    }

    #[test]
    fn test_failed_load_keeps_previous_rows() {
        let live = LiveQueries::new();
        let rx = live.register(
            Query::table("leads"),
            QueryState::loaded(vec![Row::new().with("id", "1")]),
        );

        live.publish("leads", |_| Err(StoreError::Network("offline".into())));

        let state = rx.borrow();
        assert_eq!(state.data.len(), 1);
        assert!(!state.loading);
        assert_eq!(state.error, Some(StoreError::Network("offline".into())));
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let live = LiveQueries::new();
        let rx = live.register(Query::table("leads"), QueryState::loading());
        assert_eq!(live.len(), 1);

        drop(rx);
        let count = live.publish("leads", |_| Ok(vec![]));
        assert_eq!(count, 0);
        assert!(live.is_empty());
    }
}
