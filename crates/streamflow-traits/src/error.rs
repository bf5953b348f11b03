//! Error types for the stream consumption engine

use thiserror::Error;

/// Stream engine error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The transport delivered an event with its `error` field populated
    #[error("Transport error: {0}")]
    Transport(String),

    /// No event arrived within the inactivity window
    #[error("Stream timed out after {timeout_secs}s without activity")]
    Timeout { timeout_secs: u64 },

    /// Malformed `info` or `result` payload (never fatal)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Saving the final message failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The transport refused to open a subscription
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine task has stopped and no longer accepts commands
    #[error("Stream engine is not running")]
    EngineClosed,
}

impl StreamError {
    /// Whether this error should be shown to the user.
    ///
    /// Parse errors degrade silently; everything else ends the session.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, StreamError::Parse(_))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Parse(err.to_string())
    }
}

/// Result type alias for stream engine operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let e = StreamError::Timeout { timeout_secs: 60 };
        assert_eq!(e.to_string(), "Stream timed out after 60s without activity");
    }

    #[test]
    fn display_transition() {
        let e = StreamError::InvalidTransition {
            from: "idle".into(),
            to: "finalizing".into(),
        };
        assert_eq!(e.to_string(), "Invalid session transition: idle -> finalizing");
    }

    #[test]
    fn parse_errors_are_silent() {
        assert!(!StreamError::Parse("bad json".into()).is_user_visible());
        assert!(StreamError::Transport("boom".into()).is_user_visible());
        assert!(StreamError::Persistence("disk full".into()).is_user_visible());
    }

    #[test]
    fn json_error_converts_to_parse() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert!(matches!(StreamError::from(err), StreamError::Parse(_)));
    }
}
