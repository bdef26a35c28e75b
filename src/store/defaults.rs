//! Per-user default rows.
//!
//! Each type describes one single-row table and the values a fresh row
//! starts with. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::single_row::SingleRowStore;
use crate::sync::{Row, SyncClient};

/// A typed single-row table with a default value.
pub trait RowDefaults: Default + Serialize + 'static {
    /// Table the rows live in.
    const TABLE: &'static str;

    /// A fresh default row as JSON fields.
    fn default_row() -> Row {
        match serde_json::to_value(Self::default()) {
            Ok(value) => Row::from_value(value).unwrap_or_default(),
            Err(err) => {
                tracing::error!(table = Self::TABLE, error = %err, "Failed to serialize default row");
                Row::new()
            }
        }
    }

    /// A single-row store over [`Self::TABLE`] for `user_id`, initialized
    /// lazily from [`Self::default_row`].
    fn store<C: SyncClient + ?Sized>(client: Arc<C>, user_id: &str) -> SingleRowStore<C> {
        SingleRowStore::builder(Self::TABLE, user_id)
            .defaults(Self::default_row)
            .build(client)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub theme: String,
    pub notifications: bool,
    pub language: String,
    pub timezone: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: "light".into(),
            notifications: true,
            language: "en".into(),
            timezone: "UTC".into(),
        }
    }
}

impl RowDefaults for UserSettings {
    const TABLE: &'static str = "user_settings";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub is_public: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Default for UserProfile {
    fn default() -> Self {
        let now = crate::now_millis();
        Self {
            display_name: String::new(),
            bio: String::new(),
            avatar: None,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl RowDefaults for UserProfile {
    const TABLE: &'static str = "user_profile";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub marketing_emails: bool,
    pub dark_mode: bool,
    pub compact_view: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            email_notifications: true,
            push_notifications: false,
            marketing_emails: false,
            dark_mode: false,
            compact_view: false,
        }
    }
}

impl RowDefaults for UserPreferences {
    const TABLE: &'static str = "user_preferences";
}

pub fn user_settings_store<C: SyncClient + ?Sized>(
    client: Arc<C>,
    user_id: &str,
) -> SingleRowStore<C> {
    UserSettings::store(client, user_id)
}

pub fn user_profile_store<C: SyncClient + ?Sized>(
    client: Arc<C>,
    user_id: &str,
) -> SingleRowStore<C> {
    UserProfile::store(client, user_id)
}

pub fn user_preferences_store<C: SyncClient + ?Sized>(
    client: Arc<C>,
    user_id: &str,
) -> SingleRowStore<C> {
    UserPreferences::store(client, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryClient;
    use serde_json::json;

    #[test]
    fn test_default_rows_use_camel_case() {
        let row = UserPreferences::default_row();
        assert_eq!(row.get("emailNotifications"), Some(&json!(true)));
        assert_eq!(row.get("darkMode"), Some(&json!(false)));

        let row = UserProfile::default_row();
        assert_eq!(row.get("isPublic"), Some(&json!(true)));
        assert_eq!(row.get("avatar"), Some(&serde_json::Value::Null));
        assert!(row.get("createdAt").and_then(|v| v.as_i64()).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_settings_store_round_trip() {
        let client = Arc::new(MemoryClient::new());
        let store = user_settings_store(Arc::clone(&client), "u1");
        store.initialize().await.unwrap();

        let settings: UserSettings = store.typed().unwrap().unwrap();
        assert_eq!(settings, UserSettings::default());
        assert_eq!(store.table(), "user_settings");
        assert_eq!(client.row_count("user_settings"), 1);
    }

    #[tokio::test]
    async fn test_profile_update_initializes() {
        let client = Arc::new(MemoryClient::new());
        let store = user_profile_store(client, "u1");
        store
            .update_property("displayName", json!("Dana"))
            .await
            .unwrap();

        let profile: UserProfile = store.typed().unwrap().unwrap();
        assert_eq!(profile.display_name, "Dana");
        assert!(profile.is_public);
    }
}
