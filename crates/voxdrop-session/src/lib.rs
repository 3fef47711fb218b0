//! Voxdrop session crate - capture state machine, recognizer adapter, status publishing.
//!
//! Provides the session controller that owns at most one capture session
//! and drives it through Idle -> Starting -> Listening -> Finishing -> Idle.
//! All session state lives in one tokio task; callers talk to it through a
//! cloneable `SessionController` handle.

pub mod controller;
pub mod host;
pub mod publisher;
pub mod recognizer;
pub mod session;
pub mod state;

pub use controller::{ControllerSettings, SessionController, StartOutcome, StopOutcome};
pub use host::{ChannelHost, HostNotifier, NoopHost};
pub use publisher::{ConsoleSurface, StatusPublisher, StatusSurface};
pub use recognizer::{
    MockRecognizer, Recognition, RecognitionError, RecognitionHandle, RecognitionOptions,
    RecognizerEvent, ScriptStep, SpeechRecognizer,
};
pub use session::CaptureSession;
pub use state::{SessionState, StateMachine};
