//! Error types for the chat turn pipeline.

use argo_core::error::ArgoError;

/// Errors from the chat pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ArgoError> for ChatError {
    fn from(err: ArgoError) -> Self {
        match err {
            ArgoError::Unauthorized(msg) => ChatError::Unauthorized(msg),
            ArgoError::InvalidInput(msg) => ChatError::InvalidInput(msg),
            ArgoError::ConfigurationMissing(_) | ArgoError::Config(_) => {
                ChatError::Configuration(err.to_string())
            }
            ArgoError::Upstream(msg) | ArgoError::MalformedModelOutput(msg) => {
                ChatError::Model(msg)
            }
            other => ChatError::Storage(other.to_string()),
        }
    }
}

impl ChatError {
    /// Errors that end the turn with an error response instead of an
    /// assistant message.
    pub fn is_surfaced(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage
                | ChatError::MessageTooLong(_)
                | ChatError::InvalidInput(_)
                | ChatError::Unauthorized(_)
                | ChatError::Configuration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );
        assert_eq!(
            ChatError::Model("timeout".into()).to_string(),
            "model error: timeout"
        );
    }

    #[test]
    fn test_from_argo_error() {
        let err: ChatError = ArgoError::Unauthorized("not yours".into()).into();
        assert!(matches!(err, ChatError::Unauthorized(ref m) if m == "not yours"));

        let err: ChatError = ArgoError::InvalidInput("bad id".into()).into();
        assert!(matches!(err, ChatError::InvalidInput(ref m) if m == "bad id"));

        let err: ChatError = ArgoError::ConfigurationMissing("bucket".into()).into();
        assert!(matches!(err, ChatError::Configuration(_)));
        assert!(err.to_string().contains("bucket"));

        let err: ChatError = ArgoError::Storage("disk full".into()).into();
        assert!(matches!(err, ChatError::Storage(_)));

        let err: ChatError = ArgoError::Upstream("502".into()).into();
        assert!(matches!(err, ChatError::Model(_)));
    }

    #[test]
    fn test_surfaced_errors() {
        assert!(ChatError::Unauthorized(String::new()).is_surfaced());
        assert!(ChatError::Configuration(String::new()).is_surfaced());
        assert!(ChatError::EmptyMessage.is_surfaced());
        assert!(ChatError::InvalidInput(String::new()).is_surfaced());
        assert!(!ChatError::Storage(String::new()).is_surfaced());
        assert!(!ChatError::Model(String::new()).is_surfaced());
    }
}
