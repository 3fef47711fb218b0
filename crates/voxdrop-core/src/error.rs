use thiserror::Error;

/// Top-level error type for the Voxdrop system.
///
/// Each variant carries a subsystem-specific message. Subsystem crates that
/// define their own error enums implement `From<VoxdropError>` for them so
/// that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoxdropError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Host notification failed: {0}")]
    Host(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for VoxdropError {
    fn from(err: toml::de::Error) -> Self {
        VoxdropError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoxdropError {
    fn from(err: toml::ser::Error) -> Self {
        VoxdropError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoxdropError {
    fn from(err: serde_json::Error) -> Self {
        VoxdropError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Voxdrop operations.
pub type Result<T> = std::result::Result<T, VoxdropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VoxdropError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(VoxdropError, &str)> = vec![
            (
                VoxdropError::Queue("disk full".to_string()),
                "Queue error: disk full",
            ),
            (
                VoxdropError::Recognizer("engine missing".to_string()),
                "Recognizer error: engine missing",
            ),
            (
                VoxdropError::Session("bad transition".to_string()),
                "Session error: bad transition",
            ),
            (
                VoxdropError::Host("not running".to_string()),
                "Host notification failed: not running",
            ),
            (
                VoxdropError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
            (VoxdropError::ShuttingDown, "Shutdown in progress"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VoxdropError = io_err.into();
        assert!(matches!(err, VoxdropError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: VoxdropError = err.unwrap_err().into();
        assert!(matches!(err, VoxdropError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: VoxdropError = err.unwrap_err().into();
        assert!(matches!(err, VoxdropError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(format!("value={}", value))
        }

        assert_eq!(inner().unwrap(), "value=42");
    }
}
