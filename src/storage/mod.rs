//! SQLite storage layer for Dealflow.
//!
//! Provides:
//! - Schema initialization and connection pragmas
//! - Pooled connections shared by reads and serialized writes
//! - Row-level SQL helpers (select, insert, update, delete)

pub mod pool;
pub mod rows;
pub mod schema;

pub use pool::ConnectionPool;

use thiserror::Error;

use crate::error::StoreError;

/// Error type for SQLite storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt row data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid field name {0:?}")]
    InvalidField(String),
}

impl StorageError {
    fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        if err.is_constraint_violation() {
            return Self::Conflict(err.to_string());
        }
        match err {
            StorageError::InvalidField(_) => Self::Validation(err.to_string()),
            // Pool exhaustion and open failures mean the backend is unreachable.
            StorageError::Pool(_) => Self::Network(err.to_string()),
            StorageError::Database(_) | StorageError::Decode(_) => Self::Unknown(err.to_string()),
        }
    }
}
