use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Routing tag applied to results when the producer gives none.
pub const DEFAULT_DESTINATION: &str = "inbox";

/// Prefix of the synthesized text stored when a capture fails reportably.
pub const ERROR_MARKER_PREFIX: &str = "[Recording error: ";

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn default_destination() -> String {
    DEFAULT_DESTINATION.to_string()
}

// =============================================================================
// Enums
// =============================================================================

/// The kind of a queued result.
///
/// Only voice captures are produced today. Unknown kinds read back from the
/// queue are preserved verbatim so a newer producer never loses data when an
/// older consumer round-trips the record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultKind {
    #[default]
    Voice,
    Other(String),
}

impl ResultKind {
    pub fn as_str(&self) -> &str {
        match self {
            ResultKind::Voice => "voice",
            ResultKind::Other(kind) => kind,
        }
    }
}

impl From<String> for ResultKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "voice" | "" => ResultKind::Voice,
            _ => ResultKind::Other(value),
        }
    }
}

impl From<ResultKind> for String {
    fn from(kind: ResultKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What trigger surfaces should show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    /// No capture running: the control offers to start one.
    #[default]
    Idle,
    /// A capture session is running: the control offers to stop it.
    Active,
}

impl DisplayState {
    pub fn from_recording(is_recording: bool) -> Self {
        if is_recording {
            DisplayState::Active
        } else {
            DisplayState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, DisplayState::Active)
    }

    /// Icon resource name for the trigger surface.
    pub fn icon(&self) -> &'static str {
        match self {
            DisplayState::Idle => "capture",
            DisplayState::Active => "stoprecording",
        }
    }

    /// Short label for the trigger surface.
    pub fn label(&self) -> &'static str {
        match self {
            DisplayState::Idle => "Tap to record",
            DisplayState::Active => "Recording...",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayState::Idle => "idle",
            DisplayState::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(DisplayState::Idle),
            "active" => Some(DisplayState::Active),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// A completed (or failed) capture waiting for the host application.
///
/// Serialized with the camelCase field names the host reads. The legacy names
/// written by earlier app versions (`transcription`, `projectId`,
/// `timestamp`, `type`) are accepted on input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResult {
    pub id: Uuid,
    #[serde(alias = "transcription")]
    pub text: String,
    #[serde(default = "default_destination", alias = "projectId")]
    pub destination_hint: String,
    /// Unix milliseconds.
    #[serde(alias = "timestamp")]
    pub created_at: i64,
    #[serde(default, alias = "type")]
    pub kind: ResultKind,
}

impl PendingResult {
    /// A voice transcript routed to the default destination.
    pub fn voice(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            destination_hint: default_destination(),
            created_at: now_millis(),
            kind: ResultKind::Voice,
        }
    }

    /// A `[Recording error: ...]` marker so a failed capture is visible on
    /// the next app open even though no transcript exists.
    pub fn error_marker(message: &str) -> Self {
        Self::voice(format!("{}{}]", ERROR_MARKER_PREFIX, message))
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination_hint = destination.into();
        self
    }

    pub fn is_error_marker(&self) -> bool {
        self.text.starts_with(ERROR_MARKER_PREFIX) && self.text.ends_with(']')
    }

    pub fn created_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.created_at).unwrap_or_default()
    }
}

/// Push payload delivered to a running host application after a result is
/// queued. Purely informational; the queue stays authoritative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureCompleted {
    pub text: String,
    pub timestamp: i64,
}

impl From<&PendingResult> for CaptureCompleted {
    fn from(result: &PendingResult) -> Self {
        Self {
            text: result.text.clone(),
            timestamp: result.created_at,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_defaults() {
        let result = PendingResult::voice("buy milk");
        assert!(!result.id.is_nil());
        assert_eq!(result.text, "buy milk");
        assert_eq!(result.destination_hint, "inbox");
        assert_eq!(result.kind, ResultKind::Voice);
        assert!(result.created_at > 0);
        assert!(!result.is_error_marker());
    }

    #[test]
    fn test_error_marker_format() {
        let result = PendingResult::error_marker("Insufficient permissions");
        assert_eq!(result.text, "[Recording error: Insufficient permissions]");
        assert!(result.is_error_marker());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = PendingResult::voice("a");
        let b = PendingResult::voice("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let result = PendingResult::voice("hello").with_destination("work");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["destinationHint"], "work");
        assert_eq!(json["kind"], "voice");
        assert!(json["createdAt"].is_i64());
        assert_eq!(json["id"], result.id.to_string());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let json = r#"{"id":"6a0c8f5e-3b2d-4c1a-9e8f-7d6c5b4a3f21","text":"x","createdAt":1700000000000}"#;
        let result: PendingResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.destination_hint, "inbox");
        assert_eq!(result.kind, ResultKind::Voice);
        assert_eq!(result.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_deserialize_legacy_field_names() {
        let json = r#"{
            "id": "6a0c8f5e-3b2d-4c1a-9e8f-7d6c5b4a3f21",
            "transcription": "call mom",
            "projectId": "family",
            "timestamp": 1700000000123,
            "type": "voice"
        }"#;
        let result: PendingResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.text, "call mom");
        assert_eq!(result.destination_hint, "family");
        assert_eq!(result.created_at, 1_700_000_000_123);
        assert_eq!(result.kind, ResultKind::Voice);
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let json = r#"{"id":"6a0c8f5e-3b2d-4c1a-9e8f-7d6c5b4a3f21","text":"x","createdAt":1,"kind":"photo"}"#;
        let result: PendingResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.kind, ResultKind::Other("photo".to_string()));
        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["kind"], "photo");
    }

    #[test]
    fn test_created_at_utc() {
        let mut result = PendingResult::voice("x");
        result.created_at = 1_700_000_000_000;
        assert_eq!(result.created_at_utc().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_display_state_helpers() {
        assert_eq!(DisplayState::default(), DisplayState::Idle);
        assert_eq!(DisplayState::from_recording(true), DisplayState::Active);
        assert!(!DisplayState::Idle.is_recording());
        assert_eq!(DisplayState::Active.icon(), "stoprecording");
        assert_eq!(DisplayState::Idle.icon(), "capture");
        assert_eq!(DisplayState::parse("active"), Some(DisplayState::Active));
        assert_eq!(DisplayState::parse("busy"), None);
        assert_eq!(DisplayState::Idle.to_string(), "idle");
    }

    #[test]
    fn test_capture_completed_from_result() {
        let result = PendingResult::voice("note");
        let completed = CaptureCompleted::from(&result);
        assert_eq!(completed.text, "note");
        assert_eq!(completed.timestamp, result.created_at);
    }
}
