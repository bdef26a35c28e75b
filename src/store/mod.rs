//! Reactive stores over a [`SyncClient`](crate::sync::SyncClient).
//!
//! Provides:
//! - [`TableStore`]: every row of one table (or of a custom query)
//! - [`SingleRowStore`]: exactly one row per owning key, with dynamic field
//!   access and optimistic writes
//! - Typed default rows for per-user settings, profile and preferences
//! - CRM-specific wrappers for users and activities

pub mod crm;
pub mod defaults;
pub mod single_row;
pub mod table;

pub use crm::{ActivityStore, ProfileUpdate, UserStore};
pub use defaults::{
    user_preferences_store, user_profile_store, user_settings_store, RowDefaults,
    UserPreferences, UserProfile, UserSettings,
};
pub use single_row::{
    DefaultRow, PendingWrite, SingleRowStore, SingleRowStoreBuilder, WriteFailure, OWNER_FIELD,
    RESERVED_KEYS,
};
pub use table::{BatchOutcome, TableStore};
