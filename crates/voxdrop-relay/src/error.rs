//! Error types for the trigger relay.

use voxdrop_core::error::VoxdropError;

use crate::signal::ExecutionContext;

/// Errors from relaying a trigger signal.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Capture not permitted from {0} context")]
    NotPermitted(ExecutionContext),
    #[error("Capture request rejected: {0}")]
    CaptureRejected(String),
    #[error("Intermediary context unavailable: {0}")]
    IntermediaryUnavailable(String),
    #[error("Intermediary task failed: {0}")]
    IntermediaryFailed(String),
    #[error("Delivery failed: {0}")]
    Delivery(#[from] VoxdropError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_display() {
        let err = RelayError::NotPermitted(ExecutionContext::Background);
        assert_eq!(err.to_string(), "Capture not permitted from background context");

        let err = RelayError::CaptureRejected("denied by user".to_string());
        assert_eq!(err.to_string(), "Capture request rejected: denied by user");
    }

    #[test]
    fn test_from_voxdrop_error() {
        let err: RelayError = VoxdropError::ShuttingDown.into();
        assert!(matches!(err, RelayError::Delivery(VoxdropError::ShuttingDown)));
    }
}
