//! Speech recognizer capability adapter.
//!
//! A recognizer is opened with [`SpeechRecognizer::begin`], which hands back
//! an ordered event stream and a [`RecognitionHandle`]. The handle owns the
//! capture device: cancelling it (explicitly or by dropping it) releases the
//! device exactly once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};

use voxdrop_core::config::CaptureConfig;
use voxdrop_core::error::{Result, VoxdropError};

/// Buffer between the recognizer and the controller.
const EVENT_BUFFER: usize = 32;

// =============================================================================
// Events and errors
// =============================================================================

/// One callback from the recognizer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// The recognizer is ready for speech.
    Ready,
    SpeechStart,
    SpeechEnd,
    /// Best hypothesis so far.
    Partial(String),
    /// Best final hypothesis. Ends the recognition.
    Final(String),
    Error(RecognitionError),
    Cancelled,
}

/// Recognizer failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionError {
    PermissionDenied,
    DeviceBusy,
    NetworkUnavailable,
    NetworkTimeout,
    ClientFault,
    ServerFault,
    AudioFault,
    NoSpeechDetected,
    SilenceTimeout,
    Unknown(i32),
}

impl RecognitionError {
    /// Map a platform recognizer error code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => RecognitionError::NetworkTimeout,
            2 => RecognitionError::NetworkUnavailable,
            3 => RecognitionError::AudioFault,
            4 => RecognitionError::ServerFault,
            5 => RecognitionError::ClientFault,
            6 => RecognitionError::SilenceTimeout,
            7 => RecognitionError::NoSpeechDetected,
            8 => RecognitionError::DeviceBusy,
            9 => RecognitionError::PermissionDenied,
            other => RecognitionError::Unknown(other),
        }
    }

    /// Whether the user should see this failure. Hearing nothing is not an
    /// error worth reporting.
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            RecognitionError::NoSpeechDetected | RecognitionError::SilenceTimeout
        )
    }

    /// Human-readable message stored in error markers.
    pub fn message(&self) -> String {
        match self {
            RecognitionError::PermissionDenied => "Insufficient permissions".to_string(),
            RecognitionError::DeviceBusy => "Recognition service busy".to_string(),
            RecognitionError::NetworkUnavailable => "Network error".to_string(),
            RecognitionError::NetworkTimeout => "Network timeout".to_string(),
            RecognitionError::ClientFault => "Client error".to_string(),
            RecognitionError::ServerFault => "Server error".to_string(),
            RecognitionError::AudioFault => "Audio recording error".to_string(),
            RecognitionError::NoSpeechDetected => "No speech detected".to_string(),
            RecognitionError::SilenceTimeout => "No speech input".to_string(),
            RecognitionError::Unknown(code) => format!("Unknown error: {}", code),
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

// =============================================================================
// Options
// =============================================================================

/// Parameters passed to the recognizer when a session begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Trailing silence after which the recognizer finishes on its own.
    pub silence_timeout: Duration,
    /// `None` means the system locale.
    pub locale: Option<String>,
    pub partial_results: bool,
    pub max_results: u32,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_millis(8000),
            locale: None,
            partial_results: true,
            max_results: 1,
        }
    }
}

impl From<&CaptureConfig> for RecognitionOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            silence_timeout: config.silence_timeout(),
            locale: config.locale.clone(),
            partial_results: config.partial_results,
            max_results: 1,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

type ReleaseFn = Box<dyn FnOnce() + Send>;

struct HandleInner {
    released: AtomicBool,
    release: Mutex<Option<ReleaseFn>>,
}

/// Ownership of an open recognition and its capture device.
///
/// `cancel` is idempotent and safe to call after the recognition already
/// finished. Dropping the handle cancels it.
pub struct RecognitionHandle {
    inner: Arc<HandleInner>,
}

impl RecognitionHandle {
    /// Wrap the adapter's release routine. It runs at most once.
    pub fn new(on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                released: AtomicBool::new(false),
                release: Mutex::new(Some(Box::new(on_release))),
            }),
        }
    }

    /// Stop recognition and release the device.
    pub fn cancel(&self) {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let release = match self.inner.release.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(release) = release {
            release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }
}

impl Drop for RecognitionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for RecognitionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

/// An open recognition: the handle plus its single-subscriber event stream.
#[derive(Debug)]
pub struct Recognition {
    pub handle: RecognitionHandle,
    pub events: mpsc::Receiver<RecognizerEvent>,
}

// =============================================================================
// Trait
// =============================================================================

/// A speech-to-text engine.
///
/// Implementations start listening in `begin` and report progress on the
/// returned stream. The stream closing counts as the end of recognition.
pub trait SpeechRecognizer: Send + Sync {
    /// Whether a recognizer exists on this device at all.
    fn is_available(&self) -> bool;

    /// Start listening. Fails if the engine refuses to start.
    fn begin(&self, options: &RecognitionOptions) -> Result<Recognition>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// One step of a scripted recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: RecognizerEvent,
}

impl ScriptStep {
    pub fn after(delay: Duration, event: RecognizerEvent) -> Self {
        Self { delay, event }
    }

    pub fn now(event: RecognizerEvent) -> Self {
        Self::after(Duration::ZERO, event)
    }
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Scripted(Vec<ScriptStep>),
    Manual,
    Unavailable,
    FailBegin(String),
}

/// In-process recognizer for tests and the simulated capture command.
///
/// Scripted mode plays its events on every `begin` and then keeps the
/// stream open until the handle is cancelled, like a real engine waiting for
/// more speech. Manual mode lets the caller push events with [`emit`].
///
/// [`emit`]: MockRecognizer::emit
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    behavior: MockBehavior,
    device_in_use: Arc<AtomicBool>,
    begin_count: Arc<AtomicUsize>,
    release_count: Arc<AtomicUsize>,
    sender: Arc<Mutex<Option<mpsc::Sender<RecognizerEvent>>>>,
    last_options: Arc<Mutex<Option<RecognitionOptions>>>,
}

impl MockRecognizer {
    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            device_in_use: Arc::new(AtomicBool::new(false)),
            begin_count: Arc::new(AtomicUsize::new(0)),
            release_count: Arc::new(AtomicUsize::new(0)),
            sender: Arc::new(Mutex::new(None)),
            last_options: Arc::new(Mutex::new(None)),
        }
    }

    /// Play `steps` on every `begin`.
    pub fn scripted(steps: Vec<ScriptStep>) -> Self {
        Self::with_behavior(MockBehavior::Scripted(steps))
    }

    /// Events are pushed by the caller.
    pub fn manual() -> Self {
        Self::with_behavior(MockBehavior::Manual)
    }

    /// No recognizer on this device.
    pub fn unavailable() -> Self {
        Self::with_behavior(MockBehavior::Unavailable)
    }

    /// Available, but `begin` always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::FailBegin(reason.into()))
    }

    /// A short dictation: ready, two partials, then the final transcript.
    pub fn dictation(text: &str, pace: Duration) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let half = words[..words.len() / 2].join(" ");
        let mut steps = vec![ScriptStep::now(RecognizerEvent::Ready)];
        steps.push(ScriptStep::after(pace, RecognizerEvent::SpeechStart));
        if !half.is_empty() {
            steps.push(ScriptStep::after(pace, RecognizerEvent::Partial(half)));
        }
        steps.push(ScriptStep::after(pace, RecognizerEvent::Partial(text.to_string())));
        steps.push(ScriptStep::after(pace, RecognizerEvent::SpeechEnd));
        steps.push(ScriptStep::now(RecognizerEvent::Final(text.to_string())));
        Self::scripted(steps)
    }

    /// Push one event to the open recognition (manual mode). Returns false
    /// when nothing is listening.
    pub async fn emit(&self, event: RecognizerEvent) -> bool {
        let sender = match self.sender.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Close the open stream without a terminal event (manual mode).
    pub fn close_stream(&self) {
        if let Ok(mut slot) = self.sender.lock() {
            slot.take();
        }
    }

    pub fn device_in_use(&self) -> bool {
        self.device_in_use.load(Ordering::Acquire)
    }

    pub fn begin_count(&self) -> usize {
        self.begin_count.load(Ordering::Acquire)
    }

    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::Acquire)
    }

    /// Options passed to the most recent `begin`.
    pub fn last_options(&self) -> Option<RecognitionOptions> {
        self.last_options.lock().ok().and_then(|o| o.clone())
    }

    fn release_fn(&self, cancelled: Arc<Notify>) -> impl FnOnce() + Send + 'static {
        let device = Arc::clone(&self.device_in_use);
        let releases = Arc::clone(&self.release_count);
        let sender = Arc::clone(&self.sender);
        move || {
            device.store(false, Ordering::Release);
            releases.fetch_add(1, Ordering::AcqRel);
            if let Ok(mut slot) = sender.lock() {
                slot.take();
            }
            cancelled.notify_one();
            tracing::debug!("Mock recognizer released the device");
        }
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn is_available(&self) -> bool {
        !matches!(self.behavior, MockBehavior::Unavailable)
    }

    fn begin(&self, options: &RecognitionOptions) -> Result<Recognition> {
        match &self.behavior {
            MockBehavior::Unavailable => {
                return Err(VoxdropError::Recognizer(
                    "Speech recognition not available on this device".to_string(),
                ))
            }
            MockBehavior::FailBegin(reason) => return Err(VoxdropError::Recognizer(reason.clone())),
            _ => {}
        }

        if self.device_in_use.swap(true, Ordering::AcqRel) {
            return Err(VoxdropError::Recognizer(
                RecognitionError::DeviceBusy.message(),
            ));
        }
        self.begin_count.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut last) = self.last_options.lock() {
            *last = Some(options.clone());
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancelled = Arc::new(Notify::new());
        let handle = RecognitionHandle::new(self.release_fn(Arc::clone(&cancelled)));

        match &self.behavior {
            MockBehavior::Scripted(steps) => {
                tokio::spawn(play_script(steps.iter().cloned().collect(), tx, cancelled));
            }
            _ => {
                if let Ok(mut slot) = self.sender.lock() {
                    *slot = Some(tx);
                }
            }
        }

        tracing::debug!("Mock recognizer started");
        Ok(Recognition { handle, events: rx })
    }
}

/// Send each step after its delay, then hold the stream open until cancel.
async fn play_script(
    mut steps: VecDeque<ScriptStep>,
    tx: mpsc::Sender<RecognizerEvent>,
    cancelled: Arc<Notify>,
) {
    while let Some(step) = steps.pop_front() {
        if !step.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(step.delay) => {}
                _ = cancelled.notified() => return,
            }
        }
        if tx.send(step.event).await.is_err() {
            return;
        }
    }
    cancelled.notified().await;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RecognitionError::PermissionDenied.message(),
            "Insufficient permissions"
        );
        assert_eq!(RecognitionError::DeviceBusy.message(), "Recognition service busy");
        assert_eq!(RecognitionError::AudioFault.message(), "Audio recording error");
        assert_eq!(RecognitionError::SilenceTimeout.message(), "No speech input");
        assert_eq!(RecognitionError::Unknown(42).to_string(), "Unknown error: 42");
    }

    #[test]
    fn test_reportable_classification() {
        assert!(!RecognitionError::NoSpeechDetected.is_reportable());
        assert!(!RecognitionError::SilenceTimeout.is_reportable());
        assert!(RecognitionError::PermissionDenied.is_reportable());
        assert!(RecognitionError::NetworkUnavailable.is_reportable());
        assert!(RecognitionError::Unknown(99).is_reportable());
    }

    #[test]
    fn test_from_code() {
        assert_eq!(RecognitionError::from_code(9), RecognitionError::PermissionDenied);
        assert_eq!(RecognitionError::from_code(7), RecognitionError::NoSpeechDetected);
        assert_eq!(RecognitionError::from_code(6), RecognitionError::SilenceTimeout);
        assert_eq!(RecognitionError::from_code(13), RecognitionError::Unknown(13));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = CaptureConfig::default();
        config.locale = Some("en-GB".to_string());
        config.silence_timeout_ms = 3000;
        let options = RecognitionOptions::from(&config);
        assert_eq!(options.silence_timeout, Duration::from_secs(3));
        assert_eq!(options.locale.as_deref(), Some("en-GB"));
        assert_eq!(options.max_results, 1);
        assert_eq!(RecognitionOptions::default().silence_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_handle_cancel_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = RecognitionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        handle.cancel();
        assert!(handle.is_released());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_drop_releases() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        drop(RecognitionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scripted_mock_plays_events() {
        let mock = MockRecognizer::scripted(vec![
            ScriptStep::now(RecognizerEvent::Ready),
            ScriptStep::now(RecognizerEvent::Final("hi".to_string())),
        ]);
        let mut recognition = mock.begin(&RecognitionOptions::default()).unwrap();
        assert!(mock.device_in_use());

        assert_eq!(recognition.events.recv().await, Some(RecognizerEvent::Ready));
        assert_eq!(
            recognition.events.recv().await,
            Some(RecognizerEvent::Final("hi".to_string()))
        );

        recognition.handle.cancel();
        assert!(!mock.device_in_use());
        // Player exits on cancel and closes the stream.
        assert_eq!(recognition.events.recv().await, None);
    }

    #[tokio::test]
    async fn test_mock_rejects_second_begin_while_held() {
        let mock = MockRecognizer::manual();
        let first = mock.begin(&RecognitionOptions::default()).unwrap();
        assert!(mock.begin(&RecognitionOptions::default()).is_err());
        drop(first);
        assert!(mock.begin(&RecognitionOptions::default()).is_ok());
        assert_eq!(mock.begin_count(), 2);
    }

    #[tokio::test]
    async fn test_manual_mock_emit() {
        let mock = MockRecognizer::manual();
        assert!(!mock.emit(RecognizerEvent::Ready).await);

        let mut recognition = mock.begin(&RecognitionOptions::default()).unwrap();
        assert!(mock.emit(RecognizerEvent::Partial("a".to_string())).await);
        assert_eq!(
            recognition.events.recv().await,
            Some(RecognizerEvent::Partial("a".to_string()))
        );

        mock.close_stream();
        assert_eq!(recognition.events.recv().await, None);
    }

    #[test]
    fn test_unavailable_and_failing_mocks() {
        let missing = MockRecognizer::unavailable();
        assert!(!missing.is_available());

        let failing = MockRecognizer::failing("engine crashed");
        assert!(failing.is_available());
        match failing.begin(&RecognitionOptions::default()) {
            Err(VoxdropError::Recognizer(msg)) => assert_eq!(msg, "engine crashed"),
            other => panic!("Expected Recognizer error, got {:?}", other.map(|_| ())),
        }
        assert!(!failing.device_in_use());
    }

    #[tokio::test]
    async fn test_mock_records_options() {
        let mock = MockRecognizer::manual();
        let options = RecognitionOptions {
            locale: Some("de-DE".to_string()),
            ..RecognitionOptions::default()
        };
        let _recognition = mock.begin(&options).unwrap();
        assert_eq!(mock.last_options(), Some(options));
    }
}
