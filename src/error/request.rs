//! Classified, routed request error.

use serde_json::Value;
use thiserror::Error;

use super::classify::{classify, redact_credentials, ErrorKind};
use super::transport::TransportError;
use crate::events::{Channel, RequestId};

/// A transport failure after classification, enriched with routing
/// metadata so it can be delivered back to its logical caller.
///
/// Callers never see intermediate retry attempts; the last classified
/// failure is wrapped into one of these and emitted as the single terminal
/// error event for the request id.
#[derive(Error, Debug)]
#[error("{kind} error on channel \"{channel}\" (request {request_id}): {message}")]
pub struct RequestError {
    /// Classified failure kind.
    pub kind: ErrorKind,
    /// Human-readable description from the transport.
    pub message: String,
    /// Diagnostic payload with credential headers masked.
    pub payload: Value,
    /// Channel owning the failed request.
    pub channel: Channel,
    /// Id of the failed logical request, stable across its retries.
    pub request_id: RequestId,
}

impl RequestError {
    /// Classifies a transport failure and attaches routing metadata.
    ///
    /// The diagnostic payload is scrubbed of credential header values
    /// before it is stored.
    #[must_use]
    pub fn from_transport(err: TransportError, channel: Channel, request_id: RequestId) -> Self {
        let kind = classify(&err);
        let mut payload = err.payload;
        redact_credentials(&mut payload);
        Self {
            kind,
            message: err.message,
            payload,
            channel,
            request_id,
        }
    }
}
