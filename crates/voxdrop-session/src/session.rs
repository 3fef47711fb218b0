//! The data of one capture session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::recognizer::{Recognition, RecognitionHandle, RecognizerEvent};

/// Tracks an active capture. At most one exists at a time, owned by the
/// controller task.
#[derive(Debug)]
pub struct CaptureSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Latest partial hypothesis.
    pub accumulated_text: String,
    /// Absolute cap, independent of the recognizer's silence handling.
    pub deadline: Instant,
    pub(crate) handle: RecognitionHandle,
    pub(crate) events: mpsc::Receiver<RecognizerEvent>,
    started: Instant,
}

impl CaptureSession {
    pub fn new(id: Uuid, recognition: Recognition, max_duration: Duration) -> Self {
        let started = Instant::now();
        Self {
            id,
            started_at: Utc::now(),
            accumulated_text: String::new(),
            deadline: started + max_duration,
            handle: recognition.handle,
            events: recognition.events,
            started,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record a partial hypothesis. Empty partials keep the previous text.
    pub fn update_partial(&mut self, text: String) {
        if !text.trim().is_empty() {
            self.accumulated_text = text;
        }
    }

    /// Release the recognizer. Safe to call more than once.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// The text to persist: the final payload if it has content, else the
    /// last partial, trimmed.
    pub fn final_text(&self, final_payload: Option<&str>) -> String {
        match final_payload.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => self.accumulated_text.trim().to_string(),
        }
    }
}
