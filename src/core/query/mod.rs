//! Dialect-specific query templates
//!
//! - [`catalog`] - Logical operations, configured mappings and the resolver
//! - [`template`] - Placeholder binding into executable statements

pub mod catalog;
pub mod template;

pub use catalog::{QueryCatalog, QueryMappings, QueryOperation, QueryResolver};
pub use template::{BoundQuery, Placeholder, QueryTemplate, TemplateValues};
