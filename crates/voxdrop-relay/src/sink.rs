//! Where relayed signals end up.

use async_trait::async_trait;
use tracing::{debug, info};

use voxdrop_core::error::Result;
use voxdrop_session::{SessionController, StartOutcome, StopOutcome};

use crate::signal::TriggerSignal;

/// Receiver of plain start/stop signals, with no knowledge of contexts.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn deliver(&self, signal: TriggerSignal) -> Result<()>;
}

#[async_trait]
impl SignalSink for SessionController {
    async fn deliver(&self, signal: TriggerSignal) -> Result<()> {
        match signal {
            TriggerSignal::Start => match self.start().await? {
                StartOutcome::Started(id) => info!(session_id = %id, "Relayed start"),
                StartOutcome::AlreadyActive(id) => {
                    debug!(session_id = %id, "Relayed start ignored; session running")
                }
                StartOutcome::Unavailable => info!("Relayed start: no recognizer available"),
                StartOutcome::BeginFailed { session_id, reason } => {
                    info!(session_id = %session_id, "Relayed start failed: {}", reason)
                }
            },
            TriggerSignal::Stop => match self.stop().await? {
                StopOutcome::Stopped(id) => info!(session_id = %id, "Relayed stop"),
                StopOutcome::NotActive => debug!("Relayed stop ignored; no session"),
            },
        }
        Ok(())
    }
}
