use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain events emitted by the session controller.
///
/// Consumed by in-process observers (the app binary logs them, tests assert
/// on them). Nothing here is required for delivery; the durable queue is the
/// source of truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum CaptureEvent {
    /// A start signal created a new session.
    SessionStarted { session_id: Uuid, timestamp: i64 },

    /// A start signal was ignored because a session is already running.
    StartIgnored { active_session_id: Uuid },

    /// A start signal could not create a session (recognizer missing).
    StartRejected { reason: String, timestamp: i64 },

    /// The recognizer reported it is ready for speech.
    Listening { session_id: Uuid },

    /// A session reached its terminal state and was torn down.
    SessionFinished {
        session_id: Uuid,
        cause: String,
        text_length: usize,
        duration_ms: i64,
        timestamp: i64,
    },

    /// A result was appended to the durable queue.
    ResultQueued {
        result_id: Uuid,
        is_error_marker: bool,
        timestamp: i64,
    },
}

impl CaptureEvent {
    /// The session this event belongs to, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            CaptureEvent::SessionStarted { session_id, .. }
            | CaptureEvent::Listening { session_id }
            | CaptureEvent::SessionFinished { session_id, .. } => Some(*session_id),
            CaptureEvent::StartIgnored { active_session_id } => Some(*active_session_id),
            CaptureEvent::StartRejected { .. } | CaptureEvent::ResultQueued { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let id = Uuid::new_v4();
        let event = CaptureEvent::SessionStarted {
            session_id: id,
            timestamp: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "session_started");
        assert_eq!(json["session_id"], id.to_string());
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn test_session_id_accessor() {
        let id = Uuid::new_v4();
        let finished = CaptureEvent::SessionFinished {
            session_id: id,
            cause: "stopped".to_string(),
            text_length: 3,
            duration_ms: 1000,
            timestamp: 0,
        };
        assert_eq!(finished.session_id(), Some(id));

        let rejected = CaptureEvent::StartRejected {
            reason: "missing".to_string(),
            timestamp: 0,
        };
        assert_eq!(rejected.session_id(), None);
    }

    #[test]
    fn test_event_roundtrip() {
        let event = CaptureEvent::ResultQueued {
            result_id: Uuid::new_v4(),
            is_error_marker: true,
            timestamp: 7,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: CaptureEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
