//! Error types for LinkRelay
//!
//! This module defines all error types used throughout the relay.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

// ============================================================================
// Shortener Error Classification
// ============================================================================

/// Why a single shortening call failed.
///
/// None of these are fatal: the pipeline substitutes the configured failure
/// text for the link and still sends the reply.
#[derive(Error, Debug)]
pub enum ShortenError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("request failed: {0}")]
    Transport(String),
    /// The endpoint answered with a non-2xx status.
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl ShortenError {
    /// Returns the HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ShortenError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ShortenError> for RelayError {
    fn from(err: ShortenError) -> Self {
        RelayError::Shortener(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for LinkRelay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel errors (connection failures, message routing issues, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Shortening API errors
    #[error("Shortener error: {0}")]
    Shortener(ShortenError),

    /// Settings store errors (unreadable or unwritable file, corrupt JSON)
    #[error("Store error: {0}")]
    Store(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Message bus channel closed unexpectedly
    #[error("Bus error: channel closed")]
    BusClosed,

    /// Resource not found (users, channels, etc.)
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A specialized `Result` type for LinkRelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::Config("missing bot token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing bot token");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let relay_err: RelayError = io_err.into();
        assert!(matches!(relay_err, RelayError::Io(_)));
    }

    #[test]
    fn test_shorten_error_into_relay_error() {
        let err: RelayError = ShortenError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, RelayError::Shortener(_)));
        assert_eq!(
            err.to_string(),
            "Shortener error: endpoint returned HTTP 502: bad gateway"
        );
    }

    #[test]
    fn test_shorten_error_status_code() {
        let status = ShortenError::Status {
            status: 403,
            body: String::new(),
        };
        assert_eq!(status.status_code(), Some(403));
        assert_eq!(ShortenError::Transport("dns".into()).status_code(), None);
        assert_eq!(ShortenError::Body("eof".into()).status_code(), None);
    }

    #[test]
    fn test_bus_closed_display() {
        assert_eq!(RelayError::BusClosed.to_string(), "Bus error: channel closed");
    }
}
