//! CRM-specific table stores.
//!
//! Both wrappers deref to [`TableStore`], so every generic read and mutation
//! stays available next to the domain helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::store::table::{BatchOutcome, TableStore};
use crate::sync::{Filter, Row, SyncClient};

const USERS_TABLE: &str = "users";
const ACTIVITIES_TABLE: &str = "activities";
const EMAIL_FIELD: &str = "email";
const COMPLETED_FIELD: &str = "completed";

/// Partial profile update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileUpdate {
    fn into_row(self) -> Row {
        let mut row = Row::new();
        if let Some(name) = self.name {
            row.insert("name", Value::String(name));
        }
        if let Some(email) = self.email {
            row.insert(EMAIL_FIELD, Value::String(email));
        }
        row
    }
}

/// Store over the `users` table.
pub struct UserStore<C: ?Sized> {
    inner: TableStore<C>,
}

impl<C: ?Sized> Clone for UserStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ?Sized> Deref for UserStore<C> {
    type Target = TableStore<C>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<C: SyncClient + ?Sized> UserStore<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            inner: TableStore::new(client, USERS_TABLE),
        }
    }

    /// Update name and/or email. An empty update is a validation error.
    pub async fn update_profile(&self, id: &str, profile: ProfileUpdate) -> StoreResult<()> {
        let updates = profile.into_row();
        if updates.is_empty() {
            return Err(StoreError::Validation("profile update has no fields".into()));
        }
        self.inner.update(id, updates).await
    }

    pub fn find_by_email(&self, email: &str) -> Option<Row> {
        let filter = Filter::all().eq(EMAIL_FIELD, email);
        self.inner.filter(|row| filter.matches(row)).into_iter().next()
    }

    pub fn email_exists(&self, email: &str) -> bool {
        self.find_by_email(email).is_some()
    }
}

/// Store over the `activities` table: tasks, calls and meetings with a
/// `completed` flag.
pub struct ActivityStore<C: ?Sized> {
    inner: TableStore<C>,
}

impl<C: ?Sized> Clone for ActivityStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ?Sized> Deref for ActivityStore<C> {
    type Target = TableStore<C>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

fn is_completed(row: &Row) -> bool {
    row.get(COMPLETED_FIELD)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

impl<C: SyncClient + ?Sized> ActivityStore<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            inner: TableStore::new(client, ACTIVITIES_TABLE),
        }
    }

    /// Flip the completion flag. `NotFound` when the activity is not loaded.
    pub async fn toggle(&self, id: &str) -> StoreResult<()> {
        let Some(activity) = self.inner.find_by_id(id) else {
            return Err(StoreError::not_found(
                ACTIVITIES_TABLE,
                Filter::id(id).to_string(),
            ));
        };
        self.set_completed(id, !is_completed(&activity)).await
    }

    pub async fn complete(&self, id: &str) -> StoreResult<()> {
        self.set_completed(id, true).await
    }

    pub async fn uncomplete(&self, id: &str) -> StoreResult<()> {
        self.set_completed(id, false).await
    }

    pub fn completed(&self) -> Vec<Row> {
        self.inner.filter(is_completed)
    }

    pub fn pending(&self) -> Vec<Row> {
        self.inner.filter(|row| !is_completed(row))
    }

    /// Remove every completed activity.
    pub async fn clear_completed(&self) -> BatchOutcome<()> {
        let ids: Vec<String> = self
            .completed()
            .iter()
            .filter_map(|row| row.id().map(str::to_string))
            .collect();
        self.inner.remove_many(ids).await
    }

    async fn set_completed(&self, id: &str, completed: bool) -> StoreResult<()> {
        self.inner
            .update(id, Row::new().with(COMPLETED_FIELD, completed))
            .await
    }
}
