//! Error handling for the request manager.
//!
//! Two layers of failure exist:
//!
//! 1. [`TransportError`]: a raw failure reported by the transport
//!    collaborator (HTTP status, network error, timeout, rejected verb).
//!    These stay internal to the dispatch loop.
//! 2. [`RequestError`]: a transport failure classified into a closed
//!    [`ErrorKind`] taxonomy and enriched with the owning channel and
//!    request id. This is what callers observe as a terminal outcome.
//!
//! Structural misuse (enqueueing to a channel without listeners, invalid
//! configuration) is reported synchronously through the crate-wide
//! [`Error`] type and is never retried.
//!
//! # Design
//!
//! - Strongly-typed errors via `thiserror`, `#[non_exhaustive]` for
//!   forward compatibility.
//! - Large variants are boxed to keep the enum small.
//! - Diagnostic payloads carried by classified errors have credential
//!   header values masked before they are stored or emitted; the bearer
//!   token never appears verbatim in an error.
//!
//! # Example
//!
//! ```rust
//! use request_manager::error::{Error, ErrorKind};
//!
//! let err = Error::missing_listener("reports");
//! assert!(!err.is_retryable());
//! ```

mod classify;
mod request;
mod transport;


use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

pub use classify::{redact_credentials, ErrorKind};
pub use request::RequestError;
pub use transport::TransportError;

use crate::events::Channel;
use crate::manager::BulkOutcome;

/// Result type alias for all request-manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for the `request-manager` crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A request reached a terminal, classified failure. `Arc`-shared with
    /// the event listeners that observed the same outcome.
    #[error("{0}")]
    Request(Arc<RequestError>),

    /// A raw transport failure that has not been classified yet.
    /// Boxed to keep the enum size small.
    #[error("transport error: {0}")]
    Transport(Box<TransportError>),

    /// A bulk submission in which at least one item failed. Carries every
    /// per-item outcome in submission order.
    #[error("bulk request failed: {} of {} items errored", .0.iter().filter(|o| o.is_err()).count(), .0.len())]
    Bulk(Vec<BulkOutcome>),

    /// `request_stream` was called for a channel with no registered
    /// listener. A programming error, never retried.
    #[error("no listener registered for channel \"{0}\"")]
    MissingListener(Channel),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Cow<'static, str>),

    /// The manager's dispatch loop has stopped; no further outcome can be
    /// delivered for this call.
    #[error("request manager shut down: {0}")]
    Shutdown(Cow<'static, str>),
}

impl Error {
    /// Creates a configuration error.
    /// Accepts both `&'static str` (zero allocation) and `String`.
    pub fn config(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a missing-listener error for a channel.
    pub fn missing_listener(channel: impl Into<Channel>) -> Self {
        Self::MissingListener(channel.into())
    }

    /// Creates a shutdown error.
    pub fn shutdown(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Shutdown(msg.into())
    }

    /// Whether the dispatch loop may retry after this error.
    ///
    /// Only classified transport failures other than `NotFound` are
    /// retryable; structural misuse never is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request(err) => err.kind.is_retryable(),
            Error::Transport(err) => classify::classify(err).is_retryable(),
            _ => false,
        }
    }

    /// Returns the classified request error, if this is one.
    #[must_use]
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            Error::Request(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the classified kind of this error, if it carries one.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Request(err) => Some(err.kind),
            Error::Transport(err) => Some(classify::classify(err)),
            _ => None,
        }
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Self::Request(Arc::new(err))
    }
}

impl From<Arc<RequestError>> for Error {
    fn from(err: Arc<RequestError>) -> Self {
        Self::Request(err)
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::Transport(Box::new(err))
    }
}
