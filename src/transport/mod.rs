//! Transport collaborator boundary.
//!
//! The core depends on the transport through a single operation:
//! [`Transport::execute`], which performs one HTTP call and returns either
//! an [`ApiResponse`] or a [`TransportError`] carrying the status code and
//! diagnostic payload. Admission, retries, and routing are layered on top
//! and never touch HTTP directly, so tests can substitute the transport
//! wholesale.

mod http;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::TransportError;

pub use http::HttpTransport;

/// A caller-submitted unit of work.
///
/// The verb is kept as a string and parsed at dispatch time: an
/// unrecognized verb is rejected synchronously with an unclassified error
/// before any network call is attempted.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP verb (`GET`, `POST`, `PUT`, `PATCH`, `DELETE`, any case).
    pub verb: String,
    /// Path relative to the configured base endpoint.
    pub url: String,
    /// Optional JSON body.
    pub body: Option<Value>,
    /// Extra headers merged over the defaults.
    pub headers: Option<HashMap<String, String>>,
    /// Route against the REST-flavored endpoint instead of the primary
    /// one.
    pub use_rest_api: bool,
}

impl ApiRequest {
    /// Creates a request with the given verb and path.
    pub fn new(verb: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            url: url.into(),
            body: None,
            headers: None,
            use_rest_api: false,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Creates a POST request with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new("POST", url).with_body(body)
    }

    /// Creates a PUT request with a JSON body.
    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new("PUT", url).with_body(body)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("DELETE", url)
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds an extra header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Routes against the REST-flavored endpoint.
    #[must_use]
    pub fn with_rest_api(mut self) -> Self {
        self.use_rest_api = true;
        self
    }
}

/// The verbs the transport will send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Verb {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(TransportError::network(format!(
                "unsupported http verb \"{other}\""
            ))),
        }
    }
}

/// A successful transport response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body: parsed JSON when possible, the raw text otherwise.
    pub data: Value,
    /// Response headers as a JSON object.
    pub headers: Value,
}

/// The single operation the core needs from its transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one HTTP call.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] for non-success statuses, network
    /// failures, timeouts, and unsupported verbs. Implementations must
    /// mask the authorization header value in any diagnostic payload they
    /// attach.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
