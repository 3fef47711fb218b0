pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::VoxdropConfig;
pub use error::{Result, VoxdropError};
pub use events::CaptureEvent;
pub use types::*;
