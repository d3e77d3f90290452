//! Error types for the gemimg workspace.

use thiserror::Error;

/// Result type alias using the gemimg error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for gemimg crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session referenced but absent (or already expired and evicted)
    #[error("No active session for user: {0}")]
    NotFound(String),

    /// Attempted to open a session while a valid one exists
    #[error("Session already active for user: {0}")]
    AlreadyActive(String),

    /// Session existed but its TTL elapsed
    #[error("Session expired for user: {0}")]
    Expired(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream API failure (timeouts, quota, transport)
    #[error("External service error: {0}")]
    External(String),

    /// Upstream refused the request on content-policy grounds
    #[error("Content refused: {0}")]
    Refused(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is a session-lookup failure. `Expired` gets the same
    /// user-visible handling as `NotFound`.
    pub const fn is_session_missing(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Expired(_))
    }

    /// Check if this error may succeed on retry.
    ///
    /// Auth, quota and content refusals are terminal for a given request;
    /// only transport-level failures are worth another attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::External(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_missing_classification() {
        assert!(Error::NotFound("u1".into()).is_session_missing());
        assert!(Error::Expired("u1".into()).is_session_missing());
        assert!(!Error::AlreadyActive("u1".into()).is_session_missing());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::External("timeout".into()).is_retryable());
        assert!(!Error::Refused("safety".into()).is_retryable());
        assert!(!Error::Config("no key".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::AlreadyActive("user42".into());
        assert!(err.to_string().contains("user42"));
    }
}
