//! Raw transport failure type.

use serde_json::Value;
use thiserror::Error;

/// A failure reported by the transport collaborator.
///
/// Carries the HTTP status when one was received (network errors and
/// timeouts have none) plus a diagnostic payload: the response body and,
/// when available, the outbound request headers with the authorization
/// value already masked.
///
/// This type hides the underlying HTTP library from the public API; a
/// `reqwest` error never crosses this boundary.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status code, when the failure came from a response.
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
    /// Diagnostic payload (response body, captured request headers).
    pub payload: Value,
}

impl TransportError {
    /// Creates a transport error from an HTTP error response.
    pub fn http(status: u16, message: impl Into<String>, payload: Value) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            payload,
        }
    }

    /// Creates a status-less transport error (network failure, timeout,
    /// rejected verb).
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            payload: Value::Null,
        }
    }

    /// Attaches a diagnostic payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
