//! Crate-wide result alias

use super::errors::ForgetError;

/// Result of a library operation that can fail with a [`ForgetError`]
///
/// ```
/// use forgetme::domain::{ForgetError, Result};
///
/// fn require_username(username: &str) -> Result<&str> {
///     if username.trim().is_empty() {
///         return Err(ForgetError::InvalidInput("username cannot be empty".to_string()));
///     }
///     Ok(username)
/// }
///
/// assert!(require_username("").is_err());
/// ```
pub type Result<T> = std::result::Result<T, ForgetError>;
