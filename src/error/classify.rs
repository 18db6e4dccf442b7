//! Transport failure classification and credential redaction.

use serde_json::Value;
use std::fmt;

use super::transport::TransportError;
use crate::credentials::REDACTED;

/// Closed taxonomy of classified failure kinds.
///
/// | Condition                                | Kind             |
/// |------------------------------------------|------------------|
/// | HTTP status 401                          | `Authentication` |
/// | HTTP status 404                          | `NotFound`       |
/// | HTTP status 500                          | `Server`         |
/// | any other status, or no status at all    | `Generic`        |
///
/// `NotFound` is the only non-retryable kind: retrying a missing resource
/// cannot succeed, so it is terminal on first occurrence. Every other kind
/// is treated as potentially transient up to the retry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP 401.
    Authentication,
    /// HTTP 404. Terminal on first occurrence.
    NotFound,
    /// HTTP 500.
    Server,
    /// Anything else: other statuses, network failures, timeouts,
    /// rejected verbs.
    Generic,
}

impl ErrorKind {
    /// Maps an optional HTTP status to a kind.
    #[must_use]
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(401) => Self::Authentication,
            Some(404) => Self::NotFound,
            Some(500) => Self::Server,
            _ => Self::Generic,
        }
    }

    /// Whether the dispatch loop may retry this kind of failure.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::NotFound => write!(f, "not found"),
            Self::Server => write!(f, "server"),
            Self::Generic => write!(f, "unclassified"),
        }
    }
}

/// Classifies a raw transport failure.
#[must_use]
pub fn classify(err: &TransportError) -> ErrorKind {
    ErrorKind::from_status(err.status)
}

/// Masks every authorization header value found in a diagnostic payload.
///
/// Walks the JSON tree and replaces the value of any object entry whose
/// key is `authorization` (case-insensitive) with the fixed mask string.
/// Transports mask the header before attaching it to an error, but payloads
/// echoed back by a server can still contain the credential, so the
/// classifier scrubs again before the payload is stored or emitted.
pub fn redact_credentials(payload: &mut Value) {
    match payload {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if key.eq_ignore_ascii_case("authorization") {
                    *value = Value::String(REDACTED.to_string());
                } else {
                    redact_credentials(value);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_credentials(item);
            }
        }
        _ => {}
    }
}
