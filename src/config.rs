//! Manager configuration.
//!
//! The core consumes a resolved `{endpoint, token}` pair plus rate-limit
//! and retry knobs. [`ManagerConfig::from_env`] offers the conventional
//! environment-variable loading; anything richer (config files, keychains)
//! belongs to the caller.
//!
//! # Example
//!
//! ```rust
//! use request_manager::config::ManagerConfig;
//! use std::time::Duration;
//!
//! let config = ManagerConfig::new("https://api.example.io/v1", "my-token")
//!     .with_burst_size(20)
//!     .with_period(Duration::from_millis(250));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::credentials::SecretString;
use crate::error::{Error, Result};

/// Environment variable holding the primary API endpoint.
pub const ENDPOINT_ENV: &str = "REQUEST_MANAGER_ENDPOINT";

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "REQUEST_MANAGER_TOKEN";

/// Path suffix of the REST-flavored endpoint variant.
const REST_PATH: &str = "/rest";

/// Configuration for a [`RequestManager`](crate::manager::RequestManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Primary API base endpoint, e.g. `https://api.example.io/v1`.
    pub endpoint: String,
    /// Bearer-style API token.
    pub token: SecretString,
    /// Maximum admissions per period (default: 10).
    pub burst_size: u32,
    /// Admission window length (default: 500ms).
    pub period: Duration,
    /// Retry ceiling per logical request (default: 5).
    pub max_retry_count: u32,
    /// Optional prefix prepended to the User-Agent header.
    pub user_agent_prefix: Option<String>,
    /// Per-call transport timeout (default: 30s).
    pub timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: SecretString::new(""),
            burst_size: 10,
            period: Duration::from_millis(500),
            max_retry_count: 5,
            user_agent_prefix: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration with the given endpoint and token and
    /// default rate/retry settings.
    pub fn new(endpoint: impl Into<String>, token: impl Into<SecretString>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Loads endpoint and token from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if [`ENDPOINT_ENV`] is unset. A
    /// missing token is allowed (requests will fail server-side with an
    /// authentication error).
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .map_err(|_| Error::config(format!("{ENDPOINT_ENV} is not set")))?;
        let token = std::env::var(TOKEN_ENV).unwrap_or_default();
        Ok(Self::new(endpoint, token))
    }

    /// Sets the admission burst size.
    #[must_use]
    pub fn with_burst_size(mut self, burst_size: u32) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// Sets the admission window length.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the retry ceiling.
    #[must_use]
    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count;
        self
    }

    /// Sets the User-Agent prefix.
    #[must_use]
    pub fn with_user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Sets the per-call transport timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - empty or unparsable `endpoint`
    /// - `burst_size` of zero (nothing would ever be released)
    /// - `period` under 10ms (busy-wait territory)
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::config("endpoint must not be empty"));
        }
        Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("endpoint \"{}\" is not a valid URL: {e}", self.endpoint)))?;
        if self.burst_size == 0 {
            return Err(Error::config("burst_size must be at least 1"));
        }
        if self.period < Duration::from_millis(10) {
            return Err(Error::config("period must be at least 10ms"));
        }
        Ok(())
    }

    /// Derives the REST-flavored endpoint: same scheme and host as the
    /// primary endpoint with the path rewritten to `/rest`.
    ///
    /// Logs a warning when the host does not look like a dedicated API
    /// host (`api.` prefix), since such endpoints usually reject REST
    /// calls.
    pub fn rest_endpoint(&self) -> Result<String> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("endpoint \"{}\" is not a valid URL: {e}", self.endpoint)))?;
        match url.host_str() {
            Some(host) if host.starts_with("api.") => {}
            Some(host) => {
                warn!(
                    host = %host,
                    "endpoint host does not look like an API host (expected an \"api.\" prefix)"
                );
            }
            None => return Err(Error::config("endpoint has no host")),
        }
        url.set_path(REST_PATH);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url.to_string())
    }

    /// Assembles the User-Agent header value: the optional caller prefix
    /// (normalized to end with `/`) followed by this crate's name and
    /// version.
    #[must_use]
    pub fn user_agent(&self) -> String {
        let prefix = match &self.user_agent_prefix {
            Some(p) if p.ends_with('/') => p.clone(),
            Some(p) => format!("{p}/"),
            None => String::new(),
        };
        format!("{prefix}request-manager/{}", env!("CARGO_PKG_VERSION"))
    }
}
