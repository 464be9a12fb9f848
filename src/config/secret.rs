//! Secure credential handling using the secrecy crate
//!
//! Datasource connection strings carry passwords. They are kept in a
//! [`SecretString`], which zeroes its memory on drop and redacts itself in `Debug`
//! output, and are only exposed when a pool is built.
//!
//! # Example
//!
//! ```rust
//! use forgetme::config::{redact_connection_string, secret_string};
//! use secrecy::ExposeSecret;
//!
//! let dsn = secret_string("postgresql://gdpr:hunter2@db:5432/apim".to_string());
//! assert_eq!(dsn.expose_secret().as_ref(), "postgresql://gdpr:hunter2@db:5432/apim");
//! assert_eq!(redact_connection_string(&dsn), "postgresql://***@db:5432/apim");
//! assert!(!format!("{dsn:?}").contains("hunter2"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret, SerializableSecret};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Plain string held inside a [`SecretString`]
///
/// Zeroized on drop. Serializes as the bare string so that `connection_string`
/// stays a plain TOML value.
#[derive(Clone, Debug, Zeroize, Serialize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Whether the value is empty or only whitespace
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

/// Type alias for a secret string
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Connection string with credentials replaced by `***`, safe to log
pub fn redact_connection_string(connection_string: &SecretString) -> String {
    let value = connection_string.expose_secret().as_ref();
    let scheme = value
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .unwrap_or("postgresql");

    match value.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => format!("{scheme}://***"),
    }
}
