//! Voxdrop queue crate - durable hand-off between capture and host.
//!
//! Provides a WAL-mode SQLite database with migrations, the append-ordered
//! pending results queue, and the persisted display status.

pub mod db;
pub mod migrations;
pub mod queue;
pub mod status;

pub use db::Database;
pub use queue::PendingQueue;
pub use status::StatusStore;
