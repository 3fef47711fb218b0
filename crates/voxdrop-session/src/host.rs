//! Best-effort notification of a running host application.
//!
//! The durable queue is authoritative; this only lets a host that happens to
//! be running pick a result up without polling.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use voxdrop_core::error::{Result, VoxdropError};
use voxdrop_core::types::CaptureCompleted;

/// Receiver of "a capture was queued" pushes.
#[async_trait]
pub trait HostNotifier: Send + Sync {
    async fn capture_completed(&self, payload: CaptureCompleted) -> Result<()>;
}

/// Host that is never running.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

#[async_trait]
impl HostNotifier for NoopHost {
    async fn capture_completed(&self, payload: CaptureCompleted) -> Result<()> {
        debug!(
            "No host running; capture at {} stays in the queue",
            payload.timestamp
        );
        Ok(())
    }
}

/// Host living in the same process, reached over a channel.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::Sender<CaptureCompleted>,
}

impl ChannelHost {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CaptureCompleted>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl HostNotifier for ChannelHost {
    async fn capture_completed(&self, payload: CaptureCompleted) -> Result<()> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| VoxdropError::Host("host channel closed".to_string()))
    }
}
