//! Secure storage for the API token.
//!
//! The token is the only secret this crate handles. It is wrapped in a
//! [`SecretString`] that zeroes its memory on drop and renders as
//! `[REDACTED]` in `Debug`/`Display` output, so it cannot leak through
//! logs, error reports, or memory dumps.
//!
//! # Example
//!
//! ```rust
//! use request_manager::credentials::SecretString;
//!
//! let token = SecretString::new("my-api-token");
//! assert_eq!(token.expose_secret(), "my-api-token");
//! assert_eq!(format!("{token:?}"), "[REDACTED]");
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The fixed mask substituted for credential values in diagnostics.
pub const REDACTED: &str = "[REDACTED]";

/// A string secret that is zeroed when dropped.
///
/// Access the value through [`SecretString::expose_secret`] and use it
/// immediately; never store the exposed reference.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    ///
    /// The reference must not outlive the immediate use site.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns true if no token has been configured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
