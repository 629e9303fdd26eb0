//! Error types for the studia pipeline.
//!
//! The variants encode the failure taxonomy the retry and degrade logic is
//! built on: `Transient` and `Timeout` failures may be retried, `Permanent`
//! failures fail fast, and `Search` is the typed error the semantic search
//! service propagates to its callers.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using studia's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for studia operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Material not found
    #[error("Material not found: {0}")]
    MaterialNotFound(Uuid),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient remote failure (network, 5xx) — safe to retry
    #[error("Transient service error: {0}")]
    Transient(String),

    /// Permanent remote failure (4xx, malformed request) — retrying is futile
    #[error("Permanent service error: {0}")]
    Permanent(String),

    /// Operation exceeded its time budget
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Embedding input was empty after trimming whitespace
    #[error("Empty input: cannot embed empty or whitespace-only text")]
    EmptyInput,

    /// Semantic search failed
    #[error("Search error: {0}")]
    Search(String),

    /// Blob storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error (e.g. embedding dimension mismatch)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Callers with stricter policies (extraction does not retry timeouts)
    /// pass their own predicate to `with_retry` instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Timeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    /// Classify an HTTP-layer failure into the retry taxonomy.
    ///
    /// Connection failures and 5xx responses are transient; 4xx responses and
    /// body-decode failures are permanent; request timeouts are `Timeout` so
    /// each caller can decide whether a timeout is retryable.
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Error::Timeout(e.to_string());
        }
        if let Some(status) = e.status() {
            return if status.is_server_error() {
                Error::Transient(format!("server returned {}: {}", status, e))
            } else {
                Error::Permanent(format!("server returned {}: {}", status, e))
            };
        }
        if e.is_builder() || e.is_decode() {
            return Error::Permanent(e.to_string());
        }
        // Connect errors and everything else network-shaped
        Error::Transient(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_material_not_found() {
        let id = Uuid::nil();
        let err = Error::MaterialNotFound(id);
        assert_eq!(err.to_string(), format!("Material not found: {}", id));
    }

    #[test]
    fn test_error_display_transient() {
        let err = Error::Transient("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Transient service error: connection refused"
        );
    }

    #[test]
    fn test_error_display_permanent() {
        let err = Error::Permanent("400 Bad Request".to_string());
        assert_eq!(err.to_string(), "Permanent service error: 400 Bad Request");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout("extract exceeded 300s".to_string());
        assert!(err.to_string().contains("timeout"));
        assert!(err.to_string().contains("300s"));
    }

    #[test]
    fn test_error_display_empty_input() {
        let err = Error::EmptyInput;
        assert!(err.to_string().contains("Empty input"));
    }

    #[test]
    fn test_error_display_search() {
        let err = Error::Search("embedding unavailable".to_string());
        assert_eq!(err.to_string(), "Search error: embedding unavailable");
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("blob missing".to_string());
        assert_eq!(err.to_string(), "Storage error: blob missing");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("dimension mismatch".to_string());
        assert_eq!(err.to_string(), "Configuration error: dimension mismatch");
    }

    #[test]
    fn test_is_transient_classification() {
        assert!(Error::Transient("x".into()).is_transient());
        assert!(Error::Timeout("x".into()).is_transient());
        assert!(!Error::Permanent("x".into()).is_transient());
        assert!(!Error::EmptyInput.is_transient());
        assert!(!Error::MaterialNotFound(Uuid::nil()).is_transient());
        assert!(!Error::Search("x".into()).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
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
    fn test_error_debug_format() {
        let err = Error::NotFound("preferences".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("NotFound"));
    }

    #[test]
    fn test_result_type_ok() {
        fn get_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(get_result().unwrap(), 42);
    }
}
