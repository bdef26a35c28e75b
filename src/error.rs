//! Error taxonomy shared by sync clients and stores.
//!
//! Every failure carries an [`ErrorKind`] so callers can branch on the cause
//! (retry on `Network`, surface `Validation` to the user, and so on).

use thiserror::Error;

/// Coarse failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Network,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Network => "network",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error returned by client and store operations.
///
/// Cloneable so the last query error can be kept in a published
/// [`QueryState`](crate::sync::QueryState).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no {table} row matches {target}")]
    NotFound { table: String, target: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("sync backend unavailable: {0}")]
    Network(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl StoreError {
    /// Shorthand for a [`StoreError::NotFound`].
    pub fn not_found(table: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            target: target.into(),
        }
    }

    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Network(_) => ErrorKind::Network,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unknown(format!("background task failed: {err}"))
    }
}

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;
