//! Domain error types
//!
//! This module defines the error hierarchy for forgetme. Every error kind maps to
//! one failure phase of a run: configuration, datasource initialization, strategy
//! selection, query execution or command-line input.
//! Errors are domain-specific and don't expose third-party driver types.

use thiserror::Error;

/// Main forgetme error type
///
/// A missing email, a missing IP or a missing table is never represented here:
/// those are skips and the run continues.
#[derive(Debug, Error)]
pub enum ForgetError {
    /// Malformed or missing configuration. Raised before any database work.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A connection to the datasource could not be obtained or prepared
    #[error("Failed to initialize datasource '{datasource}': {message}")]
    DatasourceInit { datasource: String, message: String },

    /// The flag combination of a table rule matches none of the modeled scenarios
    #[error("Could not find a relevant update query for table entry [{rule}] in database: {database}")]
    NoApplicableStrategy { database: String, rule: String },

    /// An update statement failed inside the datasource transaction
    #[error("Failed to update table '{table}' in database '{database}': {message}")]
    QueryExecution {
        database: String,
        table: String,
        message: String,
    },

    /// Malformed command-line input (invalid IP address, empty username)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Driver-level failure outside of a statement (commit, rollback, close)
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl ForgetError {
    /// Whether the error happened before any transactional work started
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            ForgetError::Configuration(_)
                | ForgetError::DatasourceInit { .. }
                | ForgetError::InvalidInput(_)
        )
    }

    /// Process exit code for this error
    ///
    /// 2 for configuration and input errors, 4 for datasource initialization,
    /// 5 for failures inside a datasource transaction.
    pub fn exit_code(&self) -> i32 {
        match self {
            ForgetError::Configuration(_) | ForgetError::InvalidInput(_) => 2,
            ForgetError::DatasourceInit { .. } => 4,
            _ => 5,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ForgetError {
    fn from(err: std::io::Error) -> Self {
        ForgetError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ForgetError {
    fn from(err: serde_json::Error) -> Self {
        ForgetError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ForgetError {
    fn from(err: toml::de::Error) -> Self {
        ForgetError::Configuration(format!("TOML parse error: {err}"))
    }
}
