//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted logs in rolling local files
//! - Configurable log levels, overridable with `RUST_LOG`
//! - Console output on stderr
//!
//! Plaintext identifiers of the subject are only ever logged at `debug` or below.
//!
//! # Example
//!
//! ```no_run
//! use forgetme::logging::init_logging;
//! use forgetme::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(datasource = "APIM_DB", "Processing datasource");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log a table rule that was applied
///
/// # Example
///
/// ```no_run
/// use forgetme::log_rule_applied;
///
/// log_rule_applied!("APIM_DB", "AM_USAGE", "USERNAME", "ATOMIC_REPLACE", 3u64);
/// ```
#[macro_export]
macro_rules! log_rule_applied {
    ($datasource:expr, $table:expr, $column:expr, $strategy:expr, $rows:expr) => {
        tracing::info!(
            datasource = %$datasource,
            table = %$table,
            column = %$column,
            strategy = %$strategy,
            rows_affected = $rows,
            "Rule applied"
        );
    };
}

/// Log a table rule that was skipped
///
/// # Example
///
/// ```no_run
/// use forgetme::log_rule_skipped;
///
/// log_rule_skipped!("APIM_DB", "AM_ALERT_EMAILLIST", "user email not provided");
/// ```
#[macro_export]
macro_rules! log_rule_skipped {
    ($datasource:expr, $table:expr, $reason:expr) => {
        tracing::info!(
            datasource = %$datasource,
            table = %$table,
            reason = %$reason,
            "Rule skipped"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use forgetme::log_error_with_context;
/// use forgetme::domain::ForgetError;
///
/// let error = ForgetError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = %$context,
            "Error occurred"
        );
    };
}
