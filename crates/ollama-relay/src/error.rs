//! Relay error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while opening or reading an upstream generation call.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A required request field was missing or empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The upstream could not be reached or the body read failed.
    #[error("Network error connecting to Ollama: {0}")]
    Network(String),

    /// The upstream answered with a non-success status.
    #[error("Ollama API error: {status} - {body}")]
    UpstreamStatus { status: u16, body: String },

    /// No fragment arrived within the configured idle timeout.
    #[error("upstream idle for more than {0:?}")]
    IdleTimeout(Duration),

    /// The upstream answered with a body we could not decode.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
