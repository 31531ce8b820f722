//! Shared SQLite handle used by every store.
//!
//! All worker processes open the same database file. Writers serialize on
//! SQLite's own file lock (WAL mode plus a busy timeout), which is the only
//! cross-process synchronization the stores rely on.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Blocking database task failed: {0}")]
    Task(String),
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Cloneable handle to one SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file shared with other worker processes.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|e| DatabaseError::Open(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| DatabaseError::Open(e.to_string()))?;
        // journal_mode returns the resulting mode as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|e| DatabaseError::Open(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|e| DatabaseError::Open(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the connection on the current thread.
    ///
    /// Only for setup paths (schema creation); request paths use [`Database::call`].
    pub fn with_blocking<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::Poisoned)?;
        f(&mut conn)
    }

    /// Run `f` with the connection on the blocking thread pool.
    ///
    /// A busy timeout can park the calling thread while another process
    /// holds the write lock, so store operations never run on the async
    /// executor directly.
    pub async fn call<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DatabaseError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| DatabaseError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_runs_statement() {
        let db = Database::in_memory().unwrap();
        let value: i64 = db
            .call(|conn| {
                conn.query_row("SELECT 41 + 1", [], |row| row.get(0))
                    .map_err(|e| DatabaseError::Open(e.to_string()))
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_open_file_enables_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("shared.db");
        let db = Database::open(&path, Duration::from_millis(500)).unwrap();

        let mode: String = db
            .with_blocking(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(|e| DatabaseError::Open(e.to_string()))
            })
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }
}
