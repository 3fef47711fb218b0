//! Session controller.
//!
//! A single tokio task owns all session state. Start/stop signals arrive
//! over a command channel, recognizer events over the session's event
//! stream, and the absolute deadline is a timer raced against both in one
//! `select!`. Whatever wins ends the session; the losers find no session and
//! are dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use voxdrop_core::config::VoxdropConfig;
use voxdrop_core::error::{Result, VoxdropError};
use voxdrop_core::events::CaptureEvent;
use voxdrop_core::types::{now_millis, CaptureCompleted, DisplayState, PendingResult};
use voxdrop_queue::PendingQueue;

use crate::host::HostNotifier;
use crate::publisher::StatusPublisher;
use crate::recognizer::{RecognitionError, RecognitionOptions, RecognizerEvent, SpeechRecognizer};
use crate::session::CaptureSession;
use crate::state::{SessionState, StateMachine};

const COMMAND_BUFFER: usize = 16;
const EVENT_BROADCAST_CAPACITY: usize = 64;

/// Marker text when the device has no recognizer.
pub const UNAVAILABLE_MESSAGE: &str = "Speech recognition not available on this device";

// =============================================================================
// Settings
// =============================================================================

/// Tunables for the controller, usually derived from [`VoxdropConfig`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub max_duration: Duration,
    pub recognition: RecognitionOptions,
    pub host_notify_timeout: Duration,
    pub destination: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&VoxdropConfig::default())
    }
}

impl ControllerSettings {
    pub fn from_config(config: &VoxdropConfig) -> Self {
        Self {
            max_duration: config.capture.max_duration(),
            recognition: RecognitionOptions::from(&config.capture),
            host_notify_timeout: config.capture.host_notify_timeout(),
            destination: config.queue.default_destination.clone(),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// What a start signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session is running.
    Started(Uuid),
    /// A session was already running; the signal was ignored.
    AlreadyActive(Uuid),
    /// No recognizer on this device. An error marker was queued.
    Unavailable,
    /// The recognizer refused to start. An error marker was queued and the
    /// session already ended.
    BeginFailed { session_id: Uuid, reason: String },
}

/// What a stop signal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(Uuid),
    /// No session was running; the signal was ignored.
    NotActive,
}

enum Command {
    Start(oneshot::Sender<StartOutcome>),
    Stop(oneshot::Sender<StopOutcome>),
    UpdateDisplay(bool),
    Shutdown(oneshot::Sender<()>),
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EndCause {
    Final(String),
    SpeechEnded,
    Failed(RecognitionError),
    Cancelled,
    StreamClosed,
    Deadline,
    Stopped,
    BeginFailed(String),
    Shutdown,
}

impl EndCause {
    fn label(&self) -> &'static str {
        match self {
            EndCause::Final(_) => "final_result",
            EndCause::SpeechEnded => "speech_end",
            EndCause::Failed(_) => "error",
            EndCause::Cancelled => "cancelled",
            EndCause::StreamClosed => "stream_closed",
            EndCause::Deadline => "deadline",
            EndCause::Stopped => "stopped",
            EndCause::BeginFailed(_) => "begin_failed",
            EndCause::Shutdown => "shutdown",
        }
    }

    /// Message for the error marker, if this cause is worth reporting.
    fn reportable_message(&self) -> Option<String> {
        match self {
            EndCause::Failed(error) if error.is_reportable() => Some(error.message()),
            EndCause::BeginFailed(reason) => {
                Some(format!("Failed to start recording - {}", reason))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle to the controller task.
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    events: broadcast::Sender<CaptureEvent>,
    publisher: Arc<StatusPublisher>,
}

impl SessionController {
    /// Spawn the controller task on the current tokio runtime.
    pub fn spawn(
        settings: ControllerSettings,
        recognizer: Arc<dyn SpeechRecognizer>,
        queue: PendingQueue,
        publisher: Arc<StatusPublisher>,
        host: Arc<dyn HostNotifier>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        let machine = StateMachine::new();
        let state = machine.subscribe();

        let actor = Actor {
            settings,
            recognizer,
            queue,
            publisher: Arc::clone(&publisher),
            host,
            machine,
            events: events.clone(),
            commands: commands_rx,
            session: None,
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            state,
            events,
            publisher,
        }
    }

    /// Deliver a start signal. Idempotent while a session is active.
    pub async fn start(&self) -> Result<StartOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(tx)).await?;
        rx.await.map_err(|_| VoxdropError::ShuttingDown)
    }

    /// Deliver a stop signal. Ignored when idle.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(tx)).await?;
        rx.await.map_err(|_| VoxdropError::ShuttingDown)
    }

    /// Host-side display update. Ignored when it contradicts a running
    /// session.
    ///
    /// While idle the update is published as is, so `true` shows the surface
    /// as active with no session here. A tap on that surface relays a stop,
    /// which this controller ignores until the host publishes idle again.
    pub async fn update_display(&self, is_recording: bool) -> Result<()> {
        self.send(Command::UpdateDisplay(is_recording)).await
    }

    /// End any running session (persisting what it captured) and stop the
    /// controller task.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx)).await?;
        rx.await.map_err(|_| VoxdropError::ShuttingDown)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Observe domain events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }

    /// Wait until no session is running.
    pub async fn wait_idle(&self) -> Result<()> {
        let mut rx = self.state.clone();
        let idle = rx
            .wait_for(|state| *state == SessionState::Idle)
            .await
            .is_ok();
        if idle {
            Ok(())
        } else {
            Err(VoxdropError::ShuttingDown)
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| VoxdropError::ShuttingDown)
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Actor
// =============================================================================

enum Step {
    Command(Command),
    Recognizer(Option<RecognizerEvent>),
    Deadline,
    Closed,
}

struct Actor {
    settings: ControllerSettings,
    recognizer: Arc<dyn SpeechRecognizer>,
    queue: PendingQueue,
    publisher: Arc<StatusPublisher>,
    host: Arc<dyn HostNotifier>,
    machine: StateMachine,
    events: broadcast::Sender<CaptureEvent>,
    commands: mpsc::Receiver<Command>,
    session: Option<CaptureSession>,
}

impl Actor {
    async fn run(mut self) {
        debug!("Session controller running");
        loop {
            let step = match self.session.as_mut() {
                None => match self.commands.recv().await {
                    Some(command) => Step::Command(command),
                    None => Step::Closed,
                },
                Some(session) => {
                    let deadline = session.deadline;
                    tokio::select! {
                        biased;
                        event = session.events.recv() => Step::Recognizer(event),
                        _ = tokio::time::sleep_until(deadline) => Step::Deadline,
                        command = self.commands.recv() => match command {
                            Some(command) => Step::Command(command),
                            None => Step::Closed,
                        },
                    }
                }
            };

            match step {
                Step::Command(Command::Start(reply)) => {
                    let outcome = self.handle_start();
                    let _ = reply.send(outcome);
                }
                Step::Command(Command::Stop(reply)) => {
                    let outcome = match self.session.as_ref().map(|s| s.id) {
                        Some(id) => {
                            self.end_session(EndCause::Stopped);
                            StopOutcome::Stopped(id)
                        }
                        None => {
                            debug!("Stop signal while idle; ignoring");
                            StopOutcome::NotActive
                        }
                    };
                    let _ = reply.send(outcome);
                }
                Step::Command(Command::UpdateDisplay(is_recording)) => {
                    self.handle_update_display(is_recording);
                }
                Step::Command(Command::Shutdown(reply)) => {
                    if self.session.is_some() {
                        self.end_session(EndCause::Shutdown);
                    }
                    let _ = reply.send(());
                    break;
                }
                Step::Recognizer(Some(event)) => self.handle_recognizer_event(event),
                Step::Recognizer(None) => self.end_session(EndCause::StreamClosed),
                Step::Deadline => {
                    info!("Session reached its maximum duration");
                    self.end_session(EndCause::Deadline);
                }
                Step::Closed => {
                    if self.session.is_some() {
                        self.end_session(EndCause::Shutdown);
                    }
                    break;
                }
            }
        }
        debug!("Session controller stopped");
    }

    fn handle_start(&mut self) -> StartOutcome {
        if let Some(session) = &self.session {
            debug!(session_id = %session.id, "Start signal while active; ignoring");
            self.emit(CaptureEvent::StartIgnored {
                active_session_id: session.id,
            });
            return StartOutcome::AlreadyActive(session.id);
        }

        if !self.recognizer.is_available() {
            warn!("{}", UNAVAILABLE_MESSAGE);
            self.emit(CaptureEvent::StartRejected {
                reason: UNAVAILABLE_MESSAGE.to_string(),
                timestamp: now_millis(),
            });
            let marker = PendingResult::error_marker(UNAVAILABLE_MESSAGE)
                .with_destination(self.settings.destination.clone());
            self.persist(marker);
            return StartOutcome::Unavailable;
        }

        let session_id = Uuid::new_v4();
        if let Err(e) = self.machine.transition(SessionState::Starting) {
            warn!("{}; resetting", e);
            self.machine.reset();
            if let Err(e) = self.machine.transition(SessionState::Starting) {
                warn!("Cannot start session: {}", e);
                return StartOutcome::BeginFailed {
                    session_id,
                    reason: e.to_string(),
                };
            }
        }
        self.publish(DisplayState::Active);
        self.emit(CaptureEvent::SessionStarted {
            session_id,
            timestamp: now_millis(),
        });

        match self.recognizer.begin(&self.settings.recognition) {
            Ok(recognition) => {
                let session = CaptureSession::new(session_id, recognition, self.settings.max_duration);
                info!(
                    session_id = %session_id,
                    max_duration_secs = self.settings.max_duration.as_secs(),
                    "Capture session started"
                );
                self.session = Some(session);
                StartOutcome::Started(session_id)
            }
            Err(e) => {
                let reason = match e {
                    VoxdropError::Recognizer(msg) => msg,
                    other => other.to_string(),
                };
                warn!(session_id = %session_id, "Failed to start recognizer: {}", reason);
                self.settle(
                    session_id,
                    String::new(),
                    Duration::ZERO,
                    EndCause::BeginFailed(reason.clone()),
                );
                StartOutcome::BeginFailed { session_id, reason }
            }
        }
    }

    fn handle_update_display(&mut self, is_recording: bool) {
        let requested = DisplayState::from_recording(is_recording);
        if let Some(session) = &self.session {
            if !is_recording {
                warn!(
                    session_id = %session.id,
                    "Ignoring display update to {} while a session is running",
                    requested
                );
                return;
            }
        }
        self.publish(requested);
    }

    fn handle_recognizer_event(&mut self, event: RecognizerEvent) {
        let state = self.machine.current();
        match event {
            RecognizerEvent::Ready => self.mark_listening(),
            RecognizerEvent::SpeechStart => {
                if state == SessionState::Starting {
                    self.mark_listening();
                }
                debug!("Speech started");
            }
            RecognizerEvent::Partial(text) => {
                if state == SessionState::Starting {
                    self.mark_listening();
                }
                if let Some(session) = self.session.as_mut() {
                    session.update_partial(text);
                }
            }
            RecognizerEvent::SpeechEnd => self.end_session(EndCause::SpeechEnded),
            RecognizerEvent::Final(text) => self.end_session(EndCause::Final(text)),
            RecognizerEvent::Error(error) => {
                if error.is_reportable() {
                    warn!("Recognizer error: {}", error);
                } else {
                    debug!("Recognizer finished without speech: {}", error);
                }
                self.end_session(EndCause::Failed(error));
            }
            RecognizerEvent::Cancelled => self.end_session(EndCause::Cancelled),
        }
    }

    fn mark_listening(&mut self) {
        if self.machine.current() != SessionState::Starting {
            return;
        }
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return;
        };
        match self.machine.transition(SessionState::Listening) {
            Ok(()) => {
                debug!(session_id = %session_id, "Recognizer ready");
                self.emit(CaptureEvent::Listening { session_id });
            }
            Err(e) => warn!("{}", e),
        }
    }

    /// Listening|Starting -> Finishing: release the recognizer and compute
    /// the text, then persist.
    fn end_session(&mut self, mut cause: EndCause) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.cancel();

        // The recognizer may have queued a final result right behind the
        // event that ended the session.
        if matches!(cause, EndCause::SpeechEnded | EndCause::Stopped) {
            while let Ok(event) = session.events.try_recv() {
                match event {
                    RecognizerEvent::Final(text) => {
                        cause = EndCause::Final(text);
                        break;
                    }
                    RecognizerEvent::Partial(text) => session.update_partial(text),
                    _ => {}
                }
            }
        }

        let text = match &cause {
            EndCause::Final(payload) => session.final_text(Some(payload.as_str())),
            _ => session.final_text(None),
        };
        debug!(
            session_id = %session.id,
            started_at = %session.started_at.to_rfc3339(),
            cause = cause.label(),
            "Ending capture session"
        );
        self.settle(session.id, text, session.elapsed(), cause);
    }

    /// Finishing -> Idle: queue the result and any error marker, publish
    /// idle, notify the host.
    fn settle(&mut self, session_id: Uuid, text: String, elapsed: Duration, cause: EndCause) {
        if let Err(e) = self.machine.transition(SessionState::Finishing) {
            warn!("{}", e);
        }

        let text_length = text.chars().count();
        if !text.is_empty() {
            let result =
                PendingResult::voice(text).with_destination(self.settings.destination.clone());
            self.persist(result);
        }
        if let Some(message) = cause.reportable_message() {
            let marker = PendingResult::error_marker(&message)
                .with_destination(self.settings.destination.clone());
            self.persist(marker);
        }

        self.publish(DisplayState::Idle);
        if let Err(e) = self.machine.transition(SessionState::Idle) {
            warn!("{}", e);
            self.machine.reset();
        }

        info!(
            session_id = %session_id,
            cause = cause.label(),
            text_length,
            duration_ms = elapsed.as_millis() as u64,
            "Capture session finished"
        );
        self.emit(CaptureEvent::SessionFinished {
            session_id,
            cause: cause.label().to_string(),
            text_length,
            duration_ms: elapsed.as_millis() as i64,
            timestamp: now_millis(),
        });
    }

    /// Append to the durable queue, then tell the host. A failed append is
    /// logged; there is nowhere else to put the result.
    fn persist(&self, result: PendingResult) {
        if let Err(e) = self.queue.append(&result) {
            warn!(result_id = %result.id, "Failed to queue result: {}", e);
            return;
        }
        self.emit(CaptureEvent::ResultQueued {
            result_id: result.id,
            is_error_marker: result.is_error_marker(),
            timestamp: result.created_at,
        });
        self.notify_host(CaptureCompleted::from(&result));
    }

    fn notify_host(&self, payload: CaptureCompleted) {
        let host = Arc::clone(&self.host);
        let timeout = self.settings.host_notify_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, host.capture_completed(payload)).await {
                Ok(Ok(())) => debug!("Host notified"),
                Ok(Err(e)) => debug!("Host notification ignored: {}", e),
                Err(_) => debug!("Host notification timed out"),
            }
        });
    }

    fn publish(&self, state: DisplayState) {
        if let Err(e) = self.publisher.publish(state) {
            warn!("Failed to publish display state {}: {}", state, e);
        }
    }

    fn emit(&self, event: CaptureEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================
