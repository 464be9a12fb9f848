//! Configuration management for forgetme.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! forgetme uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - Default values for optional settings
//! - `FORGETME_*` environment overrides
//! - Validation of every table and column name before any database work
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry run
//! - [`AnonymizationConfig`] - Super tenant domain, IP pseudonym range, audit log
//! - [`DatasourceConfig`] - One pooled PostgreSQL datasource
//! - [`DatasourceTarget`] - Table rules for one database
//! - [`QueryMappings`] - Query templates for one database product and version
//! - [`LoggingConfig`] - Log file settings
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [[datasources]]
//! name = "APIM_ANALYTICS_DB"
//! connection_string = "${FORGETME_ANALYTICS_DSN}"
//!
//! [[databases]]
//! database_name = "APIM_ANALYTICS_DB"
//!
//! [[databases.table_entries]]
//! table_name = "ApimAllAlert"
//! column_name = "message"
//! text_replace = true
//! replace_text_prefix = "user "
//! replace_text_suffix = " exceeded"
//! ```
//!
//! [`AnonymizationConfig`]: crate::anonymization::config::AnonymizationConfig
//! [`DatasourceTarget`]: crate::domain::rule::DatasourceTarget
//! [`QueryMappings`]: crate::core::query::catalog::QueryMappings

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{ApplicationConfig, DatasourceConfig, ForgetConfig, LoggingConfig};
pub use secret::{redact_connection_string, secret_string, SecretString, SecretValue};
