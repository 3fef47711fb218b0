use std::fmt;

/// A signal from a trigger surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSignal {
    Start,
    Stop,
}

impl TriggerSignal {
    /// The signal a tap sends: a surface drawn as recording asks to stop,
    /// anything else asks to start.
    pub fn from_display_hint(is_recording: bool) -> Self {
        if is_recording {
            TriggerSignal::Stop
        } else {
            TriggerSignal::Start
        }
    }
}

impl fmt::Display for TriggerSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSignal::Start => write!(f, "start"),
            TriggerSignal::Stop => write!(f, "stop"),
        }
    }
}

/// Where the relay is running when a signal arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// A visible, user-facing context.
    Foreground,
    /// A short-lived receiver with no visible surface.
    Background,
    /// The relay's own short-lived visible context.
    Intermediary,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Foreground => write!(f, "foreground"),
            ExecutionContext::Background => write!(f, "background"),
            ExecutionContext::Intermediary => write!(f, "intermediary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_display_hint() {
        assert_eq!(TriggerSignal::from_display_hint(true), TriggerSignal::Stop);
        assert_eq!(TriggerSignal::from_display_hint(false), TriggerSignal::Start);
    }

    #[test]
    fn test_display() {
        assert_eq!(TriggerSignal::Start.to_string(), "start");
        assert_eq!(ExecutionContext::Intermediary.to_string(), "intermediary");
    }
}
