//! Trigger relay.
//!
//! Forwards start/stop signals to a [`SignalSink`]. A start arriving in a
//! context the platform does not trust is escalated through a short-lived
//! intermediary: it becomes visible, obtains the capture privilege, delivers
//! the start, stays visible for the configured hold, then dismisses itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use voxdrop_core::config::RelayConfig;

use crate::error::RelayError;
use crate::policy::PlatformPolicy;
use crate::signal::{ExecutionContext, TriggerSignal};
use crate::sink::SignalSink;

/// What the relay did with a signal.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The signal reached the sink before `relay` returned.
    Delivered,
    /// An intermediary is carrying the start; await the handle for its
    /// result.
    Deferred(IntermediaryHandle),
}

/// Summary of a finished intermediary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntermediaryReport {
    /// Time between becoming visible and dismissal.
    pub visible_for: Duration,
}

/// Join handle of a running intermediary.
#[derive(Debug)]
pub struct IntermediaryHandle {
    task: JoinHandle<Result<IntermediaryReport, RelayError>>,
}

impl IntermediaryHandle {
    /// Wait for the intermediary to dismiss itself.
    pub async fn wait(self) -> Result<IntermediaryReport, RelayError> {
        self.task
            .await
            .map_err(|e| RelayError::IntermediaryFailed(e.to_string()))?
    }
}

pub struct TriggerRelay {
    policy: Arc<dyn PlatformPolicy>,
    sink: Arc<dyn SignalSink>,
    visibility_hold: Duration,
}

impl TriggerRelay {
    pub fn new(
        policy: Arc<dyn PlatformPolicy>,
        sink: Arc<dyn SignalSink>,
        visibility_hold: Duration,
    ) -> Self {
        Self {
            policy,
            sink,
            visibility_hold,
        }
    }

    pub fn from_config(
        config: &RelayConfig,
        policy: Arc<dyn PlatformPolicy>,
        sink: Arc<dyn SignalSink>,
    ) -> Self {
        Self::new(policy, sink, config.visibility_hold())
    }

    /// Relay `signal` received in `context`.
    ///
    /// Stop signals need no privilege and always go straight through. A
    /// refused capture request is logged and returned; no session starts.
    pub async fn relay(
        &self,
        signal: TriggerSignal,
        context: ExecutionContext,
    ) -> Result<RelayOutcome, RelayError> {
        debug!(%signal, %context, "Relaying trigger signal");

        if signal == TriggerSignal::Stop {
            self.sink.deliver(TriggerSignal::Stop).await?;
            return Ok(RelayOutcome::Delivered);
        }

        if self.policy.permits(context) {
            if let Err(e) = self.policy.request_capture(context).await {
                warn!(%context, "Capture request refused: {}", e);
                return Err(e);
            }
            self.sink.deliver(TriggerSignal::Start).await?;
            return Ok(RelayOutcome::Delivered);
        }

        info!(%context, "Context may not capture; escalating through intermediary");
        let task = tokio::spawn(run_intermediary(
            Arc::clone(&self.policy),
            Arc::clone(&self.sink),
            self.visibility_hold,
        ));
        Ok(RelayOutcome::Deferred(IntermediaryHandle { task }))
    }

    /// Relay the signal implied by a surface's display hint.
    pub async fn relay_tap(
        &self,
        is_recording: bool,
        context: ExecutionContext,
    ) -> Result<RelayOutcome, RelayError> {
        self.relay(TriggerSignal::from_display_hint(is_recording), context)
            .await
    }
}

impl std::fmt::Debug for TriggerRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRelay")
            .field("visibility_hold", &self.visibility_hold)
            .finish()
    }
}

/// The intermediary's whole life. It ends once the start was accepted, not
/// when the session does.
async fn run_intermediary(
    policy: Arc<dyn PlatformPolicy>,
    sink: Arc<dyn SignalSink>,
    hold: Duration,
) -> Result<IntermediaryReport, RelayError> {
    policy.show_intermediary().await?;
    let shown = Instant::now();

    let delivered = async {
        policy
            .request_capture(ExecutionContext::Intermediary)
            .await?;
        sink.deliver(TriggerSignal::Start).await?;
        Ok::<(), RelayError>(())
    }
    .await;

    match &delivered {
        Ok(()) => {
            if !hold.is_zero() {
                tokio::time::sleep_until(shown + hold).await;
            }
        }
        Err(e) => warn!("Intermediary could not start capture: {}", e),
    }

    policy.dismiss_intermediary().await;
    let visible_for = shown.elapsed();
    debug!("Intermediary finished after {:?}", visible_for);

    delivered.map(|()| IntermediaryReport { visible_for })
}
