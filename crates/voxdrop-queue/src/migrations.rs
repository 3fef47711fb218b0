//! Database schema migrations.
//!
//! v1 creates the pending results queue, v2 adds the persisted display
//! status used by trigger surfaces started in a fresh process.

use rusqlite::Connection;
use tracing::info;

use voxdrop_core::error::VoxdropError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), VoxdropError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| VoxdropError::Queue(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| VoxdropError::Queue(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: pending_results");
    }
    if current_version < 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: display_status");
    }

    Ok(())
}

/// Version 1: the pending results queue.
///
/// `seq` gives the append order; `id` is the public identifier.
fn apply_v1(conn: &Connection) -> Result<(), VoxdropError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pending_results (
            seq               INTEGER PRIMARY KEY AUTOINCREMENT,
            id                TEXT NOT NULL UNIQUE,
            text              TEXT NOT NULL,
            destination_hint  TEXT NOT NULL DEFAULT 'inbox',
            created_at        INTEGER NOT NULL,
            kind              TEXT NOT NULL DEFAULT 'voice'
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'pending_results');
        ",
    )
    .map_err(|e| VoxdropError::Queue(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

/// Version 2: single-row display status.
fn apply_v2(conn: &Connection) -> Result<(), VoxdropError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS display_status (
            slot        INTEGER PRIMARY KEY CHECK (slot = 0),
            state       TEXT NOT NULL CHECK (state IN ('idle', 'active')),
            updated_at  INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (2, 'display_status');
        ",
    )
    .map_err(|e| VoxdropError::Queue(format!("Failed to apply migration v2: {}", e)))?;

    Ok(())
}
