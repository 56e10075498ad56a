//! Error types for the price front
//!
//! Provides unified error handling using thiserror. Transport failures are
//! never surfaced raw: the executor classifies them into [`Error`] first.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Transport Error Enum ==
/// Outcome of a single failed attempt against the upstream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// The attempt did not finish within the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream answered, but the response was classified as unsuccessful
    #[error("Upstream returned status {status}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// Status code carried by the error, if the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// == Error Enum ==
/// Unified error type for the cache, the executor and the price service.
#[derive(Error, Debug)]
pub enum Error {
    /// Cache key was empty or whitespace
    #[error("Invalid key: cache keys cannot be empty or blank")]
    InvalidKey,

    /// Circuit breaker is open; the call was not attempted
    #[error("Service temporarily unavailable, retry after {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    /// Every attempt failed; wraps the last observed cause
    #[error("Request failed after {attempts} attempt(s): {source}")]
    RequestFailed {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The caller cancelled the logical call
    #[error("Request cancelled")]
    Cancelled,

    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidKey => StatusCode::BAD_REQUEST,
            Error::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::RequestFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;
