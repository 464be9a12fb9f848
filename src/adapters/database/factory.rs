//! Datasource registry factory
//!
//! This module creates the datasource registry from configuration.

use crate::adapters::database::traits::DatasourceRegistry;
use crate::adapters::postgresql::client::PostgreSQLDatasources;
use crate::config::schema::ForgetConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the datasource registry for all configured datasources
///
/// # Errors
///
/// Returns an error if a datasource pool cannot be created
pub fn create_datasource_registry(config: &ForgetConfig) -> Result<Arc<dyn DatasourceRegistry>> {
    tracing::info!(
        datasources = config.datasources.len(),
        "Creating PostgreSQL datasource pools"
    );
    let registry = PostgreSQLDatasources::new(&config.datasources)?;
    Ok(Arc::new(registry))
}
