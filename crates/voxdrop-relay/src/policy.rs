//! Platform execution policy.
//!
//! Some platforms only let a capture device be opened while a visible
//! context is active. A `PlatformPolicy` tells the relay which contexts are
//! allowed and provides the intermediary visible context when one is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::RelayError;
use crate::signal::ExecutionContext;

#[async_trait]
pub trait PlatformPolicy: Send + Sync {
    /// Whether a capture may be requested from `context` directly.
    fn permits(&self, context: ExecutionContext) -> bool;

    /// Ask for the capture privilege. May prompt the user and may be refused.
    async fn request_capture(&self, context: ExecutionContext) -> Result<(), RelayError>;

    /// Bring the intermediary visible context up.
    async fn show_intermediary(&self) -> Result<(), RelayError>;

    /// Take the intermediary visible context down.
    async fn dismiss_intermediary(&self);
}

/// Everything is permitted and no intermediary is ever needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePolicy;

#[async_trait]
impl PlatformPolicy for PermissivePolicy {
    fn permits(&self, _context: ExecutionContext) -> bool {
        true
    }

    async fn request_capture(&self, _context: ExecutionContext) -> Result<(), RelayError> {
        Ok(())
    }

    async fn show_intermediary(&self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn dismiss_intermediary(&self) {}
}

/// A restricted platform for tests and the simulated capture command.
///
/// Background contexts may not capture. The intermediary's visibility is
/// recorded so callers can check how long it stayed up.
#[derive(Debug, Default)]
pub struct SimulatedPolicy {
    reject_capture: bool,
    capture_requests: AtomicUsize,
    shown_at: Mutex<Option<Instant>>,
    visible_spans: Mutex<Vec<Duration>>,
}

impl SimulatedPolicy {
    pub fn restricted() -> Self {
        Self::default()
    }

    /// Like `restricted`, but every capture request is refused.
    pub fn rejecting() -> Self {
        Self {
            reject_capture: true,
            ..Self::default()
        }
    }

    pub fn capture_requests(&self) -> usize {
        self.capture_requests.load(Ordering::Acquire)
    }

    pub fn is_visible(&self) -> bool {
        self.shown_at.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// How long each intermediary stayed visible, in order.
    pub fn visible_spans(&self) -> Vec<Duration> {
        self.visible_spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlatformPolicy for SimulatedPolicy {
    fn permits(&self, context: ExecutionContext) -> bool {
        !matches!(context, ExecutionContext::Background)
    }

    async fn request_capture(&self, context: ExecutionContext) -> Result<(), RelayError> {
        self.capture_requests.fetch_add(1, Ordering::AcqRel);
        if !self.permits(context) {
            return Err(RelayError::NotPermitted(context));
        }
        if self.reject_capture {
            return Err(RelayError::CaptureRejected("denied by user".to_string()));
        }
        Ok(())
    }

    async fn show_intermediary(&self) -> Result<(), RelayError> {
        let mut shown = self
            .shown_at
            .lock()
            .map_err(|e| RelayError::IntermediaryUnavailable(e.to_string()))?;
        if shown.is_some() {
            return Err(RelayError::IntermediaryUnavailable(
                "already visible".to_string(),
            ));
        }
        *shown = Some(Instant::now());
        debug!("Intermediary visible");
        Ok(())
    }

    async fn dismiss_intermediary(&self) {
        let shown = self.shown_at.lock().ok().and_then(|mut s| s.take());
        if let Some(shown) = shown {
            if let Ok(mut spans) = self.visible_spans.lock() {
                spans.push(shown.elapsed());
            }
            debug!("Intermediary dismissed after {:?}", shown.elapsed());
        }
    }
}
