//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode and durable-write PRAGMAs on initialization.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use voxdrop_core::error::VoxdropError;

use crate::migrations;

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Thread-safe SQLite database wrapper.
///
/// The queue file is shared by independent processes (the capture side and
/// the host application), so every connection runs in WAL mode with
/// `synchronous = FULL`: a committed append survives a crash of either side.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and run pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, VoxdropError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| VoxdropError::Queue(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT_MS
        ))
        .map_err(|e| VoxdropError::Queue(format!("Failed to set pragmas: {}", e)))?;

        info!("Queue database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, VoxdropError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VoxdropError::Queue(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, VoxdropError>
    where
        F: FnOnce(&Connection) -> Result<T, VoxdropError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VoxdropError::Queue(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a closure inside an immediate transaction.
    ///
    /// The transaction commits only if the closure returns `Ok`.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, VoxdropError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, VoxdropError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| VoxdropError::Queue(format!("Database lock poisoned: {}", e)))?;
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(|e| VoxdropError::Queue(format!("Failed to begin transaction: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| VoxdropError::Queue(format!("Failed to commit: {}", e)))?;
        Ok(value)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM pending_results", [], |row| row.get(0))
                .map_err(|e| VoxdropError::Queue(e.to_string()))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_file_database_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pending.db");
        let db = Database::new(&path).unwrap();
        assert!(path.exists());

        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| VoxdropError::Queue(e.to_string()))?;
            assert_eq!(mode, "wal");

            // FULL = 2
            let sync: i64 = conn
                .query_row("PRAGMA synchronous", [], |row| row.get(0))
                .map_err(|e| VoxdropError::Queue(e.to_string()))?;
            assert_eq!(sync, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), VoxdropError> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO pending_results (id, text, destination_hint, created_at, kind)
                 VALUES ('a', 'x', 'inbox', 1, 'voice')",
                [],
            )
            .map_err(|e| VoxdropError::Queue(e.to_string()))?;
            Err(VoxdropError::Queue("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM pending_results", [], |row| row.get(0))
                    .map_err(|e| VoxdropError::Queue(e.to_string()))
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
