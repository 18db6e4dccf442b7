//! Client-side HTTP request manager.
//!
//! Wraps an HTTP API client with three guarantees the transport alone
//! cannot give:
//!
//! - **Rate-limited admission**: requests enter a FIFO queue and are
//!   released in bursts (default 10 per 500ms), so callers can submit
//!   freely without tripping server-side limits.
//! - **Transparent retries**: transient failures are retried up to a
//!   ceiling (default 5) under the same rate limit; only terminal
//!   outcomes are observable. A missing resource (404) is terminal on
//!   first occurrence.
//! - **Classified errors with masked credentials**: failures surface as a
//!   closed taxonomy (authentication / not-found / server / generic) and
//!   the authorization header value never appears in an error payload.
//!
//! # Example
//!
//! ```rust,no_run
//! use request_manager::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = ManagerConfig::new("https://api.example.io/v1", "my-token");
//! let manager = RequestManager::new(config)?;
//!
//! let response = manager.request(ApiRequest::get("/orgs")).await?;
//! println!("{}", response.data);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Global clippy suppressions: these apply broadly across the codebase and
// would require excessive local annotations.
//
// - module_name_repetitions: common pattern in Rust libraries (e.g. RequestError in error module)
// - missing_errors_doc: too verbose to document every Result-returning function
// - missing_panics_doc: too verbose to document every potential panic
// - must_use_candidate: not all return values need #[must_use]
// - doc_markdown: technical terms in docs don't need backticks (e.g. JSON, FIFO)
// - return_self_not_must_use: builder pattern methods return Self without must_use
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]

// Re-exports of external dependencies
pub use serde;
pub use serde_json;

// Core modules
pub mod admission;
pub mod config;
pub mod credentials;
pub(crate) mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod transport;

// Re-exports of core types for convenience
pub use config::ManagerConfig;
pub use credentials::{SecretString, REDACTED};
pub use error::{Error, ErrorKind, RequestError, Result, TransportError};
pub use events::{Channel, EventKind, EventPayload, ListenerBinding, RequestId, STREAM_CHANNEL};
pub use manager::{BulkOutcome, RequestManager};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
// Re-export CancellationToken for convenient access
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```rust
/// use request_manager::prelude::*;
/// ```
pub mod prelude {
    pub use crate::admission::{admission_queue, AdmissionConfig};
    pub use crate::config::ManagerConfig;
    pub use crate::credentials::SecretString;
    pub use crate::error::{Error, ErrorKind, RequestError, Result};
    pub use crate::events::{Channel, EventKind, EventPayload, ListenerBinding, RequestId};
    pub use crate::logging::{init_logging, try_init_logging, LogConfig, LogFormat, LogLevel};
    pub use crate::manager::{BulkOutcome, RequestManager};
    pub use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;
    pub use tokio_util::sync::CancellationToken;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
