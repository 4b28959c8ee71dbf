use thiserror::Error;

/// Top-level error type for the Argo system.
///
/// Variants follow the recovery taxonomy used across the workspace:
/// `Unauthorized` and `ConfigurationMissing` surface to the caller, while
/// `Upstream` and `MalformedModelOutput` are expected to be recovered locally
/// by whoever receives them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArgoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ArgoError {
    fn from(err: toml::de::Error) -> Self {
        ArgoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ArgoError {
    fn from(err: toml::ser::Error) -> Self {
        ArgoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ArgoError {
    fn from(err: serde_json::Error) -> Self {
        ArgoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Argo operations.
pub type Result<T> = std::result::Result<T, ArgoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArgoError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ArgoError, &str)> = vec![
            (
                ArgoError::ConfigurationMissing("transcripts bucket".into()),
                "Configuration missing: transcripts bucket",
            ),
            (
                ArgoError::Unauthorized("conversation c1".into()),
                "Unauthorized: conversation c1",
            ),
            (ArgoError::NotFound("user".into()), "Not found: user"),
            (
                ArgoError::InvalidInput("conversation id".into()),
                "Invalid input: conversation id",
            ),
            (
                ArgoError::Upstream("bank timeout".into()),
                "Upstream unavailable: bank timeout",
            ),
            (
                ArgoError::MalformedModelOutput("no json".into()),
                "Malformed model output: no json",
            ),
            (ArgoError::Storage("locked".into()), "Storage error: locked"),
            (
                ArgoError::Serialization("eof".into()),
                "Serialization error: eof",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ArgoError = io_err.into();
        assert!(matches!(err, ArgoError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ArgoError = json_err.into();
        assert!(matches!(err, ArgoError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: ArgoError = toml_err.into();
        assert!(matches!(err, ArgoError::Config(_)));
    }
}
