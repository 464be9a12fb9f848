//! PostgreSQL datasource registry
//!
//! One connection pool per configured datasource. Pools are created lazily by
//! deadpool, so building the registry never touches the network; the first
//! connection is made when a session opens.

use crate::adapters::database::traits::{DatabaseConnection, DatasourceRegistry, Dialect};
use crate::adapters::postgresql::connection::PostgreSQLConnection;
use crate::config::schema::DatasourceConfig;
use crate::config::secret::redact_connection_string;
use crate::domain::{ForgetError, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;

/// Product name reported for every PostgreSQL connection
pub const POSTGRESQL_PRODUCT_NAME: &str = "PostgreSQL";

struct PooledDatasource {
    name: String,
    pool: Pool,
    statement_timeout_seconds: u64,
    safe_connection_string: String,
}

/// PostgreSQL datasources keyed by name (case-insensitive)
pub struct PostgreSQLDatasources {
    datasources: Vec<PooledDatasource>,
}

impl PostgreSQLDatasources {
    /// Create the pools for all configured datasources
    ///
    /// # Errors
    ///
    /// Returns [`ForgetError::DatasourceInit`] if a connection string cannot be
    /// parsed or a pool cannot be built.
    pub fn new(configs: &[DatasourceConfig]) -> Result<Self> {
        let datasources = configs
            .iter()
            .map(build_pool)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { datasources })
    }

    fn find(&self, name: &str) -> Option<&PooledDatasource> {
        self.datasources
            .iter()
            .find(|ds| ds.name.eq_ignore_ascii_case(name))
    }

    /// Connection string of a datasource with credentials redacted
    pub fn connection_string_safe(&self, name: &str) -> Option<&str> {
        self.find(name).map(|ds| ds.safe_connection_string.as_str())
    }
}

fn build_pool(config: &DatasourceConfig) -> Result<PooledDatasource> {
    let init_error = |message: String| ForgetError::DatasourceInit {
        datasource: config.name.clone(),
        message,
    };

    let pg_config: tokio_postgres::Config = {
        use secrecy::ExposeSecret;
        config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| init_error(format!("Invalid PostgreSQL connection string: {e}")))?
    };

    // Clean recycling discards session state left behind by a failed session.
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Clean,
        },
    );

    let timeout = Duration::from_secs(config.connection_timeout_seconds);
    let pool = Pool::builder(manager)
        .max_size(config.max_connections)
        .wait_timeout(Some(timeout))
        .create_timeout(Some(timeout))
        .recycle_timeout(Some(timeout))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| init_error(format!("Failed to create connection pool: {e}")))?;

    Ok(PooledDatasource {
        name: config.name.clone(),
        pool,
        statement_timeout_seconds: config.statement_timeout_seconds,
        safe_connection_string: redact_connection_string(&config.connection_string),
    })
}

#[async_trait]
impl DatasourceRegistry for PostgreSQLDatasources {
    fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn names(&self) -> Vec<String> {
        self.datasources.iter().map(|ds| ds.name.clone()).collect()
    }

    async fn connect(&self, name: &str) -> Result<Box<dyn DatabaseConnection>> {
        let datasource = self.find(name).ok_or_else(|| ForgetError::DatasourceInit {
            datasource: name.to_string(),
            message: "No datasource registered with this name".to_string(),
        })?;

        let init_error = |message: String| ForgetError::DatasourceInit {
            datasource: datasource.name.clone(),
            message,
        };

        let client = datasource
            .pool
            .get()
            .await
            .map_err(|e| init_error(format!("Failed to get connection from pool: {e}")))?;

        // Set statement timeout
        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                datasource.statement_timeout_seconds * 1000
            ))
            .await
            .map_err(|e| init_error(format!("Failed to set statement timeout: {e}")))?;

        let row = client
            .query_one("SHOW server_version", &[])
            .await
            .map_err(|e| init_error(format!("Failed to read server version: {e}")))?;
        let version: String = row
            .try_get(0)
            .map_err(|e| init_error(format!("Unexpected server version value: {e}")))?;

        tracing::debug!(
            datasource = %datasource.name,
            target = %datasource.safe_connection_string,
            server_version = %version,
            "Connected to PostgreSQL"
        );

        Ok(Box::new(PostgreSQLConnection::new(
            client,
            Dialect::new(POSTGRESQL_PRODUCT_NAME, version),
        )))
    }
}
