//! Dealflow: the client-side data layer of a sales CRM.
//!
//! Dealflow binds reactive row stores to an injected sync client, keeps a
//! byte-bounded LRU cache for derived results, and computes virtual-scroll
//! windows for long lead and deal lists.
//!
//! # Architecture
//!
//! - **Injected client**: all authoritative state lives behind [`sync::SyncClient`]
//! - **Reactive reads**: live queries are published through `tokio::sync::watch`
//! - **Typed failures**: mutations return [`error::StoreError`] with an explicit kind
//! - **Optimistic writes**: single-row stores apply field writes locally first
//!
//! # Modules
//!
//! - [`cache`]: Size-accounted LRU memory cache
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Error taxonomy shared by clients and stores
//! - [`observability`]: Tracing setup
//! - [`scroll`]: Virtual scroll window manager
//! - [`storage`]: SQLite schema and connection pool
//! - [`store`]: Table and single-row stores
//! - [`sync`]: Sync client contract plus memory and SQLite clients

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // store::table::TableStore is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::cast_precision_loss,        // Byte counts fit comfortably in f64
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod scroll;
pub mod storage;
pub mod store;
pub mod sync;

pub use error::{ErrorKind, StoreError};

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) row ID.
///
/// UUIDv7 keeps rows created later sorting after earlier ones, which matches
/// the insertion order the stores present.
///
/// # Example
///
/// ```
/// let id = dealflow::generate_row_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_row_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
