//! A single pooled PostgreSQL connection driven by a session

use crate::adapters::database::traits::{DatabaseConnection, Dialect, ParamStyle};
use crate::core::query::template::BoundQuery;
use crate::domain::{ForgetError, Result};
use async_trait::async_trait;
use deadpool_postgres::Object;
use tokio_postgres::types::ToSql;

const PROBE_SAVEPOINT: &str = "forgetme_table_probe";

/// PostgreSQL connection holding one pooled client for the whole transaction
pub struct PostgreSQLConnection {
    client: Option<Object>,
    dialect: Dialect,
}

impl PostgreSQLConnection {
    pub fn new(client: Object, dialect: Dialect) -> Self {
        Self {
            client: Some(client),
            dialect,
        }
    }

    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| ForgetError::Database("Connection already closed".to_string()))
    }

    async fn batch(&self, sql: &str) -> Result<()> {
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(|e| ForgetError::Database(format!("{sql} failed: {}", describe(&e))))
    }
}

/// Server errors display as a bare "db error"; spell out what the server reported
fn describe(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => format_db_error(db.code().code(), db.message(), db.detail(), db.hint()),
        None => error.to_string(),
    }
}

fn format_db_error(code: &str, message: &str, detail: Option<&str>, hint: Option<&str>) -> String {
    let mut text = format!("{message} (SQLSTATE {code})");
    if let Some(detail) = detail {
        text.push_str(&format!(", detail: {detail}"));
    }
    if let Some(hint) = hint {
        text.push_str(&format!(", hint: {hint}"));
    }
    text
}

fn params(query: &BoundQuery) -> Vec<&(dyn ToSql + Sync)> {
    query
        .params()
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect()
}

#[async_trait]
impl DatabaseConnection for PostgreSQLConnection {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Numbered
    }

    async fn begin(&mut self) -> Result<()> {
        self.batch("BEGIN").await
    }

    async fn probe(&mut self, query: &BoundQuery) -> bool {
        if self
            .batch(&format!("SAVEPOINT {PROBE_SAVEPOINT}"))
            .await
            .is_err()
        {
            return false;
        }

        let found = match self.client() {
            Ok(client) => client.query(query.sql(), &params(query)).await.is_ok(),
            Err(_) => false,
        };

        if !found {
            // A failed statement aborts the transaction until rolled back to the savepoint
            if let Err(e) = self
                .batch(&format!("ROLLBACK TO SAVEPOINT {PROBE_SAVEPOINT}"))
                .await
            {
                tracing::warn!(error = %e, "Failed to roll back table probe savepoint");
            }
        }

        if let Err(e) = self
            .batch(&format!("RELEASE SAVEPOINT {PROBE_SAVEPOINT}"))
            .await
        {
            tracing::warn!(error = %e, "Failed to release table probe savepoint");
        }

        found
    }

    async fn execute(&mut self, query: &BoundQuery) -> Result<u64> {
        self.client()?
            .execute(query.sql(), &params(query))
            .await
            .map_err(|e| ForgetError::Database(describe(&e)))
    }

    async fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK").await
    }

    async fn close(&mut self) {
        // Dropping the object returns it to the pool
        self.client.take();
    }
}
