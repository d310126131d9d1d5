//! HTTP executor seam
//!
//! The rate limiter never talks to the network itself; it hands each request
//! to an [`HttpExecutor`]. [`crate::Requester`] is the reqwest-backed
//! implementation used in production.

use crate::request::{RestRequest, RestResponse};
use async_trait::async_trait;
use chat_common::RestError;

/// Network-level failures (no HTTP response was received)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Other(String),
}

impl From<TransportError> for RestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Sends one request and returns the raw response
///
/// Any HTTP status, including 429 and 5xx, is a successful execution; only
/// failures to obtain a response are errors.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, TransportError>;
}
