//! Persisted display status.
//!
//! Trigger surfaces can be redrawn by a process that never saw the session
//! (a fresh CLI invocation, a restarted host). The last published state is
//! kept here so they render the right control.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tracing::warn;

use voxdrop_core::error::VoxdropError;
use voxdrop_core::types::{now_millis, DisplayState};

use crate::db::Database;

#[derive(Debug, Clone)]
pub struct StatusStore {
    db: Arc<Database>,
}

impl StatusStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Overwrite the stored state.
    pub fn record(&self, state: DisplayState) -> Result<(), VoxdropError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO display_status (slot, state, updated_at) VALUES (0, ?1, ?2)
                 ON CONFLICT(slot) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                rusqlite::params![state.as_str(), now_millis()],
            )
            .map_err(|e| VoxdropError::Queue(format!("Failed to record display status: {}", e)))?;
            Ok(())
        })
    }

    /// The last recorded state, or `Idle` if none was ever recorded.
    pub fn latest(&self) -> Result<DisplayState, VoxdropError> {
        let stored: Option<String> = self.db.with_conn(|conn| {
            conn.query_row("SELECT state FROM display_status WHERE slot = 0", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| VoxdropError::Queue(e.to_string()))
        })?;

        Ok(match stored {
            Some(value) => DisplayState::parse(&value).unwrap_or_else(|| {
                warn!("Unknown stored display state {:?}, treating as idle", value);
                DisplayState::Idle
            }),
            None => DisplayState::Idle,
        })
    }
}
