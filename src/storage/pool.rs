//! Connection pool for the SQLite sync client.
//!
//! Uses r2d2 with r2d2_sqlite. SQLite WAL mode lets pooled readers run while
//! the client's write gate serializes writers.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use super::schema::{apply_pragmas, initialize_schema};
use super::StorageError;

/// Pooled read-write connections to one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    /// Open a pool for the given database path and create the schema.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file (created if missing)
    /// * `max_size` - Maximum number of connections in the pool
    pub fn open<P: AsRef<Path>>(db_path: P, max_size: u32) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(db_path.as_ref());

        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;

        initialize_schema(&*pool.get()?)?;
        tracing::debug!(path = %db_path.as_ref().display(), max_size, "SQLite pool opened");

        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        Ok(self.pool.get()?)
    }

    /// Get the current pool state for monitoring.
    pub fn state(&self) -> r2d2::State {
        self.pool.state()
    }
}

/// Connection customizer that applies pragmas on every new connection.
#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas(conn)
    }
}
