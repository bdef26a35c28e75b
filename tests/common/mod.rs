//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - Temporary database fixtures
//! - A polling helper for asynchronous conditions

#![allow(dead_code)]

use dealflow::sync::SqliteClient;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Test fixture that manages a temporary data directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary data directory
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary data directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join(dealflow::config::DB_FILE_NAME);
        Self { temp_dir, db_path }
    }

    /// Get the data directory as a string.
    pub fn data_dir_str(&self) -> &str {
        self.temp_dir.path().to_str().expect("invalid path")
    }

    /// Open a SQLite client on the fixture database.
    pub fn client(&self) -> Arc<SqliteClient> {
        Arc::new(SqliteClient::open(&self.db_path, 4).expect("failed to open database"))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
