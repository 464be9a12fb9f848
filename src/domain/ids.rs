//! SQL identifier newtype with validation
//!
//! Table and column names are substituted into query templates literally because
//! identifiers cannot be bound as statement parameters. [`SqlIdentifier`] restricts
//! them to plain (optionally schema-qualified) identifiers so that no configured
//! name can change the shape of a statement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, unquoted SQL identifier such as `AM_ALERT` or `apim.AM_ALERT`
///
/// # Examples
///
/// ```
/// use forgetme::domain::ids::SqlIdentifier;
///
/// let table = SqlIdentifier::new("APIM_ALL_ALERT").unwrap();
/// assert_eq!(table.as_str(), "APIM_ALL_ALERT");
///
/// assert!(SqlIdentifier::new("users; DROP TABLE users").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// Creates a new identifier
    ///
    /// Accepts one or two dot-separated parts, each starting with an ASCII letter or
    /// underscore followed by ASCII letters, digits, underscores or `$`.
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("SQL identifier cannot be empty".to_string());
        }

        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|part| is_identifier_part(part)) {
            return Err(format!(
                "Invalid SQL identifier '{name}'. Expected [schema.]name made of letters, digits and underscores"
            ));
        }

        Ok(Self(name))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_identifier_part(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for SqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SqlIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SqlIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SqlIdentifier> for String {
    fn from(id: SqlIdentifier) -> Self {
        id.0
    }
}

impl AsRef<str> for SqlIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
