//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over datasources, allowing the
//! anonymization engine to run against PostgreSQL or an in-memory test double.

pub mod factory;
pub mod traits;

pub use factory::create_datasource_registry;
pub use traits::{DatabaseConnection, DatasourceRegistry, Dialect, ParamStyle};
