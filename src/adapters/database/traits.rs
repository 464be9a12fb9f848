//! Database abstraction traits
//!
//! This module defines the traits that datasource adapters must implement to be
//! driven by an anonymization session.

use crate::core::query::template::BoundQuery;
use crate::domain::Result;
use async_trait::async_trait;
use std::fmt;

/// Database product and version reported by a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Product name, e.g. `PostgreSQL`
    pub product_name: String,

    /// Product version, e.g. `16.2`
    pub product_version: String,
}

impl Dialect {
    pub fn new(product_name: impl Into<String>, product_version: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_version: product_version.into(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.product_name, self.product_version)
    }
}

/// How bound parameters are written into SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
    /// `?` per occurrence
    Positional,
}

/// One live connection owned by a session
///
/// Implementations run every statement on the same physical connection so that
/// `begin`, the statements and `commit`/`rollback` share one transaction.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Product and version of the connected database
    fn dialect(&self) -> &Dialect;

    /// Parameter style expected by the driver
    fn param_style(&self) -> ParamStyle;

    /// Start a transaction (autocommit off)
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    async fn begin(&mut self) -> Result<()>;

    /// Run a probe statement inside the open transaction
    ///
    /// Returns `false` on any failure. A failed probe must leave the transaction
    /// usable.
    async fn probe(&mut self, query: &BoundQuery) -> bool;

    /// Execute an update statement and return the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    async fn execute(&mut self, query: &BoundQuery) -> Result<u64>;

    /// Commit the open transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    async fn rollback(&mut self) -> Result<()>;

    /// Release the connection
    async fn close(&mut self);
}

/// Registry of named datasources
///
/// Datasource names are matched case-insensitively.
#[async_trait]
pub trait DatasourceRegistry: Send + Sync {
    /// Whether a datasource with this name is registered
    fn contains(&self, name: &str) -> bool;

    /// Registered datasource names
    fn names(&self) -> Vec<String>;

    /// Obtain a dedicated connection to the named datasource
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ForgetError::DatasourceInit`] if the datasource is
    /// unknown or no connection can be established.
    async fn connect(&self, name: &str) -> Result<Box<dyn DatabaseConnection>>;
}
