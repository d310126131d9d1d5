//! REST error types
//!
//! Errors surfaced to callers of the REST client. Rate limits never appear
//! here: a 429 only delays the request.

use crate::config::ConfigError;
use chat_core::RouteError;

/// Client-wide REST error type
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    // Request lifecycle
    #[error("Request cancelled before it was sent")]
    Cancelled,

    #[error("Rate limiter dropped the request before it completed")]
    Dropped,

    // Response errors
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode response body: {0}")]
    Decode(String),

    // Route errors
    #[error(transparent)]
    Route(#[from] RouteError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl RestError {
    /// Get error code for diagnostics
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Dropped => "DROPPED",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Route(e) => e.code(),
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status of the failed response, if the server answered
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller may reasonably resend the request
    ///
    /// Transport failures and server errors are retriable; this layer never
    /// retries them itself.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<ConfigError> for RestError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for REST operations
pub type RestResult<T> = Result<T, RestError>;
