//! PostgreSQL datasource integration
//!
//! This module provides the pooled PostgreSQL datasource registry and the
//! connection type a session drives.

pub mod client;
pub mod connection;

pub use client::PostgreSQLDatasources;
pub use connection::PostgreSQLConnection;
