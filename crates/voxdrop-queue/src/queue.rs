//! The durable pending-results queue.
//!
//! Producers append; the host application reads everything in append order
//! and clears what it has imported. Every write is a single SQLite
//! transaction, so a reader in another process sees either the whole record
//! or none of it.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use voxdrop_core::error::VoxdropError;
use voxdrop_core::types::{PendingResult, ResultKind};

use crate::db::Database;

const SELECT_ALL: &str = "SELECT id, text, destination_hint, created_at, kind
                          FROM pending_results ORDER BY seq ASC";

/// Crash-safe, append-ordered store of results awaiting import.
#[derive(Debug, Clone)]
pub struct PendingQueue {
    db: Arc<Database>,
}

impl PendingQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open the queue file at `path`, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, VoxdropError> {
        Ok(Self::new(Arc::new(Database::new(path)?)))
    }

    /// An in-memory queue (for testing).
    pub fn in_memory() -> Result<Self, VoxdropError> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }

    /// Shared handle to the underlying database.
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Append one result. The record is durable once this returns `Ok`.
    ///
    /// Appending a result whose id is already queued is an error; nothing is
    /// overwritten.
    pub fn append(&self, result: &PendingResult) -> Result<(), VoxdropError> {
        self.db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO pending_results (id, text, destination_hint, created_at, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    result.id.to_string(),
                    result.text,
                    result.destination_hint,
                    result.created_at,
                    result.kind.as_str(),
                ],
            )
            .map_err(|e| VoxdropError::Queue(format!("Failed to append result: {}", e)))?;
            Ok(())
        })?;
        debug!(
            "Queued result {} ({} chars, kind={})",
            result.id,
            result.text.chars().count(),
            result.kind
        );
        Ok(())
    }

    /// Every queued result, oldest first. An empty queue yields an empty
    /// vector.
    pub fn read_all(&self) -> Result<Vec<PendingResult>, VoxdropError> {
        self.db.with_conn(read_rows)
    }

    /// Remove every queued result. Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize, VoxdropError> {
        let removed = self.db.with_transaction(|tx| {
            tx.execute("DELETE FROM pending_results", [])
                .map_err(|e| VoxdropError::Queue(format!("Failed to clear queue: {}", e)))
        })?;
        info!("Cleared {} pending results", removed);
        Ok(removed)
    }

    /// Remove one result by id. Returns whether it was present.
    pub fn clear_by_id(&self, id: Uuid) -> Result<bool, VoxdropError> {
        let removed = self.db.with_transaction(|tx| {
            tx.execute(
                "DELETE FROM pending_results WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| VoxdropError::Queue(format!("Failed to clear result {}: {}", id, e)))
        })?;
        Ok(removed > 0)
    }

    /// Remove exactly the listed results. Ids that are not queued are
    /// skipped. Results appended after the caller's read are untouched.
    pub fn acknowledge(&self, ids: &[Uuid]) -> Result<usize, VoxdropError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.db.with_transaction(|tx| delete_ids(tx, ids.iter().copied()))?;
        if removed < ids.len() {
            debug!(
                "Acknowledged {} of {} results; the rest were already gone",
                removed,
                ids.len()
            );
        }
        Ok(removed)
    }

    /// Read and remove every queued result in one transaction.
    ///
    /// A result appended concurrently lands either in the returned batch or
    /// in the queue afterwards, never in neither. Rows that could not be
    /// returned stay queued.
    pub fn drain(&self) -> Result<Vec<PendingResult>, VoxdropError> {
        let drained = self.db.with_transaction(|tx| {
            let results = read_rows(tx)?;
            delete_ids(tx, results.iter().map(|r| r.id))?;
            Ok(results)
        })?;
        if !drained.is_empty() {
            info!("Drained {} pending results", drained.len());
        }
        Ok(drained)
    }

    /// Number of queued results.
    pub fn len(&self) -> Result<usize, VoxdropError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM pending_results", [], |row| row.get(0))
                .map_err(|e| VoxdropError::Queue(e.to_string()))?;
            Ok(count as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool, VoxdropError> {
        Ok(self.len()? == 0)
    }
}

fn delete_ids(
    conn: &rusqlite::Connection,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<usize, VoxdropError> {
    let mut stmt = conn
        .prepare_cached("DELETE FROM pending_results WHERE id = ?1")
        .map_err(|e| VoxdropError::Queue(e.to_string()))?;
    let mut removed = 0;
    for id in ids {
        removed += stmt
            .execute(rusqlite::params![id.to_string()])
            .map_err(|e| VoxdropError::Queue(format!("Failed to remove {}: {}", id, e)))?;
    }
    Ok(removed)
}

/// Read all rows in append order, skipping rows whose id is unreadable.
fn read_rows(conn: &rusqlite::Connection) -> Result<Vec<PendingResult>, VoxdropError> {
    let mut stmt = conn
        .prepare_cached(SELECT_ALL)
        .map_err(|e| VoxdropError::Queue(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .map_err(|e| VoxdropError::Queue(e.to_string()))?;

    let mut results = Vec::new();
    for row in rows {
        let (id, text, destination_hint, created_at, kind) =
            row.map_err(|e| VoxdropError::Queue(e.to_string()))?;
        let id = match Uuid::parse_str(&id) {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping queued row with invalid id {:?}: {}", id, e);
                continue;
            }
        };
        results.push(PendingResult {
            id,
            text,
            destination_hint,
            created_at,
            kind: ResultKind::from(kind),
        });
    }
    Ok(results)
}

// =============================================================================
// Tests
// =============================================================================
