//! Voxdrop relay crate - delivers trigger signals through permitted contexts.
//!
//! Trigger surfaces send plain start/stop signals from whatever context the
//! platform woke them in. The relay forwards them to the session controller,
//! escalating a start through a short-lived visible intermediary when the
//! current context may not open the capture device.

pub mod error;
pub mod policy;
pub mod relay;
pub mod signal;
pub mod sink;

pub use error::RelayError;
pub use policy::{PermissivePolicy, PlatformPolicy, SimulatedPolicy};
pub use relay::{IntermediaryHandle, IntermediaryReport, RelayOutcome, TriggerRelay};
pub use signal::{ExecutionContext, TriggerSignal};
pub use sink::SignalSink;
