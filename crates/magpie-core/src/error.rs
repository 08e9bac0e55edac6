//! Error types for magpie.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using magpie's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for magpie operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// State document error
    #[error("State error: {0}")]
    State(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Closed taxonomy of per-candidate failures.
///
/// Every failure observed while driving a bookmark through the pipeline is
/// classified exactly once, at the boundary where the raw error occurs.
/// Downstream retry logic only ever consults this enum, never the raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection timeout, DNS failure, HTTP 5xx, or a sink write failure.
    Network,
    /// HTTP 429 from the target platform.
    RateLimit,
    /// HTTP 404 — the post was deleted or never existed.
    NotFound,
    /// HTTP 200 but the content model was not recognized.
    Parse,
    /// Inference call failure or unparsable model response.
    Ollama,
}

impl FailureKind {
    /// Whether this failure kind is ever worth retrying.
    pub fn is_retriable(self) -> bool {
        !matches!(self, FailureKind::NotFound)
    }

    /// Attempts allowed before the URL is promoted to the permanent
    /// failure list. Deleted content gets exactly one.
    pub fn max_attempts(self) -> u32 {
        match self {
            FailureKind::NotFound => 1,
            _ => 3,
        }
    }

    /// Whether this failure escalates the global fetch backoff.
    ///
    /// Deleted content will not come back, and inference failures say
    /// nothing about the platform's rate limits.
    pub fn affects_backoff(self) -> bool {
        matches!(
            self,
            FailureKind::Network | FailureKind::RateLimit | FailureKind::Parse
        )
    }

    /// Stable string form, matching the persisted snake_case encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::NotFound => "not_found",
            FailureKind::Parse => "parse",
            FailureKind::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("MAGPIE_API_URL is required".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: MAGPIE_API_URL is required"
        );
    }

    #[test]
    fn test_error_display_request() {
        let err = Error::Request("connection refused".to_string());
        assert_eq!(err.to_string(), "Request error: connection refused");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_state() {
        let err = Error::State("rename failed".to_string());
        assert_eq!(err.to_string(), "State error: rename failed");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_not_found_is_terminal() {
        assert!(!FailureKind::NotFound.is_retriable());
        assert_eq!(FailureKind::NotFound.max_attempts(), 1);
        assert!(!FailureKind::NotFound.affects_backoff());
    }

    #[test]
    fn test_retriable_kinds_get_three_attempts() {
        for kind in [
            FailureKind::Network,
            FailureKind::RateLimit,
            FailureKind::Parse,
            FailureKind::Ollama,
        ] {
            assert!(kind.is_retriable(), "{kind} should be retriable");
            assert_eq!(kind.max_attempts(), 3, "{kind} should allow 3 attempts");
        }
    }

    #[test]
    fn test_ollama_failures_do_not_touch_backoff() {
        // Backoff paces fetches against the platform; a local inference
        // failure is unrelated to the platform's rate limits.
        assert!(!FailureKind::Ollama.affects_backoff());
        assert!(FailureKind::Network.affects_backoff());
        assert!(FailureKind::RateLimit.affects_backoff());
        assert!(FailureKind::Parse.affects_backoff());
    }

    #[test]
    fn test_failure_kind_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&FailureKind::RateLimit).unwrap(),
            "\"rate_limit\""
        );
        assert_eq!(
            serde_json::from_str::<FailureKind>("\"not_found\"").unwrap(),
            FailureKind::NotFound
        );
    }

    #[test]
    fn test_failure_kind_display_matches_serde() {
        for kind in [
            FailureKind::Network,
            FailureKind::RateLimit,
            FailureKind::NotFound,
            FailureKind::Parse,
            FailureKind::Ollama,
        ] {
            let via_serde = serde_json::to_string(&kind).unwrap();
            assert_eq!(via_serde, format!("\"{kind}\""));
        }
    }
}
