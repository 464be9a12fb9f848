//! Connection session
//!
//! A [`Session`] owns the one connection used for one datasource during a run. It
//! opens a transaction on creation and resolves the query templates for the
//! connection's dialect. It ends with exactly one commit or rollback, then close.
//!
//! ```text
//! OPEN -> COMMITTED   -> CLOSED
//!      -> ROLLED_BACK -> CLOSED
//! ```

use crate::adapters::database::traits::{DatabaseConnection, DatasourceRegistry, Dialect};
use crate::anonymization::strategy::QueryInvocation;
use crate::core::query::catalog::{QueryCatalog, QueryResolver};
use crate::core::query::template::Placeholder;
use crate::domain::ids::SqlIdentifier;
use crate::domain::{ForgetError, Result};
use std::fmt;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Committed,
    RolledBack,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Open => "OPEN",
            SessionState::Committed => "COMMITTED",
            SessionState::RolledBack => "ROLLED_BACK",
            SessionState::Closed => "CLOSED",
        };
        write!(f, "{name}")
    }
}

/// One transactional connection to one datasource
pub struct Session {
    datasource: String,
    connection: Box<dyn DatabaseConnection>,
    resolver: QueryResolver,
    state: SessionState,
}

impl Session {
    /// Connects, resolves the dialect's templates and starts a transaction
    ///
    /// # Errors
    ///
    /// Returns [`ForgetError::DatasourceInit`] if no connection can be obtained, the
    /// catalog has no mappings for the dialect or the transaction cannot start.
    pub async fn open(
        registry: &dyn DatasourceRegistry,
        datasource: &str,
        catalog: &QueryCatalog,
    ) -> Result<Self> {
        let mut connection = registry.connect(datasource).await?;

        let init_error = |message: String| ForgetError::DatasourceInit {
            datasource: datasource.to_string(),
            message,
        };

        let resolver = match QueryResolver::for_dialect(catalog, connection.dialect()) {
            Ok(resolver) => resolver,
            Err(e) => {
                connection.close().await;
                return Err(init_error(e.to_string()));
            }
        };

        if let Err(e) = connection.begin().await {
            connection.close().await;
            return Err(init_error(format!("Failed to start transaction: {e}")));
        }

        tracing::debug!(
            datasource = %datasource,
            dialect = %resolver.dialect(),
            "Session opened"
        );

        Ok(Self {
            datasource: datasource.to_string(),
            connection,
            resolver,
            state: SessionState::Open,
        })
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dialect(&self) -> &Dialect {
        self.resolver.dialect()
    }

    /// Whether `table` exists in the datasource
    ///
    /// Never fails: a missing mapping, a bind error or a probe error all read as
    /// "does not exist". The open transaction stays usable either way.
    pub async fn table_exists(&mut self, table: &SqlIdentifier) -> bool {
        if self.state != SessionState::Open {
            tracing::warn!(
                datasource = %self.datasource,
                state = %self.state,
                "Table probe on a session that is not open"
            );
            return false;
        }

        let invocation = QueryInvocation::table_check(table);
        let bound = match self
            .resolver
            .resolve(invocation.operation)
            .and_then(|template| template.bind(&invocation.values, self.connection.param_style()))
        {
            Ok(bound) => bound,
            Err(e) => {
                tracing::warn!(
                    datasource = %self.datasource,
                    table = %table,
                    error = %e,
                    "Could not prepare table check"
                );
                return false;
            }
        };

        self.connection.probe(&bound).await
    }

    /// Resolves, binds and executes one statement
    ///
    /// # Errors
    ///
    /// Returns [`ForgetError::QueryExecution`] if the session is not open or the
    /// statement cannot be prepared or executed.
    pub async fn execute(&mut self, invocation: &QueryInvocation) -> Result<u64> {
        let table = invocation
            .values
            .get(Placeholder::TableName)
            .unwrap_or_default()
            .to_string();
        let execution_error = |message: String| ForgetError::QueryExecution {
            database: self.datasource.clone(),
            table: table.clone(),
            message,
        };

        if self.state != SessionState::Open {
            return Err(execution_error(format!(
                "Session is {}, cannot execute '{}'",
                self.state, invocation.operation
            )));
        }

        let bound = self
            .resolver
            .resolve(invocation.operation)
            .and_then(|template| template.bind(&invocation.values, self.connection.param_style()))
            .map_err(|e| execution_error(e.to_string()))?;

        tracing::trace!(
            datasource = %self.datasource,
            operation = %invocation.operation,
            sql = %bound.sql(),
            "Executing statement"
        );

        self.connection
            .execute(&bound)
            .await
            .map_err(|e| execution_error(e.to_string()))
    }

    /// Commits the transaction
    ///
    /// Logs a warning and does nothing if the session is not open.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the session stays open so that
    /// [`Session::close`] rolls back.
    pub async fn commit(&mut self) -> Result<()> {
        if self.state != SessionState::Open {
            tracing::warn!(
                datasource = %self.datasource,
                state = %self.state,
                "Commit requested on a session that is not open"
            );
            return Ok(());
        }

        self.connection.commit().await?;
        self.state = SessionState::Committed;
        tracing::debug!(datasource = %self.datasource, "Transaction committed");
        Ok(())
    }

    /// Rolls back the transaction
    ///
    /// Logs a warning and does nothing if the session is not open.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != SessionState::Open {
            tracing::warn!(
                datasource = %self.datasource,
                state = %self.state,
                "Rollback requested on a session that is not open"
            );
            return Ok(());
        }

        let result = self.connection.rollback().await;
        self.state = SessionState::RolledBack;
        tracing::debug!(datasource = %self.datasource, "Transaction rolled back");
        result
    }

    /// Releases the connection, rolling back first if still open
    ///
    /// Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if self.state == SessionState::Open {
            if let Err(e) = self.rollback().await {
                tracing::warn!(
                    datasource = %self.datasource,
                    error = %e,
                    "Rollback before close failed"
                );
            }
        }

        self.connection.close().await;
        self.state = SessionState::Closed;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("datasource", &self.datasource)
            .field("dialect", self.resolver.dialect())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::traits::ParamStyle;
    use crate::core::query::template::BoundQuery;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn push(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }

        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct ScriptedConnection {
        dialect: Dialect,
        calls: Arc<Calls>,
        fail_execute: bool,
    }

    #[async_trait]
    impl DatabaseConnection for ScriptedConnection {
        fn dialect(&self) -> &Dialect {
            &self.dialect
        }

        fn param_style(&self) -> ParamStyle {
            ParamStyle::Numbered
        }

        async fn begin(&mut self) -> Result<()> {
            self.calls.push("begin");
            Ok(())
        }

        async fn probe(&mut self, query: &BoundQuery) -> bool {
            self.calls.push(format!("probe {}", query.sql()));
            query.sql().contains("PRESENT")
        }

        async fn execute(&mut self, query: &BoundQuery) -> Result<u64> {
            self.calls.push(format!("execute {}", query.sql()));
            if self.fail_execute {
                Err(ForgetError::Database("constraint violated".to_string()))
            } else {
                Ok(1)
            }
        }

        async fn commit(&mut self) -> Result<()> {
            self.calls.push("commit");
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            self.calls.push("rollback");
            Ok(())
        }

        async fn close(&mut self) {
            self.calls.push("close");
        }
    }

    struct ScriptedRegistry {
        product: &'static str,
        calls: Arc<Calls>,
        fail_execute: bool,
    }

    #[async_trait]
    impl DatasourceRegistry for ScriptedRegistry {
        fn contains(&self, name: &str) -> bool {
            name.eq_ignore_ascii_case("db")
        }

        fn names(&self) -> Vec<String> {
            vec!["db".to_string()]
        }

        async fn connect(&self, _name: &str) -> Result<Box<dyn DatabaseConnection>> {
            Ok(Box::new(ScriptedConnection {
                dialect: Dialect::new(self.product, "16.1"),
                calls: Arc::clone(&self.calls),
                fail_execute: self.fail_execute,
            }))
        }
    }

    fn registry(product: &'static str, fail_execute: bool) -> (ScriptedRegistry, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (
            ScriptedRegistry {
                product,
                calls: Arc::clone(&calls),
                fail_execute,
            },
            calls,
        )
    }

    fn update() -> QueryInvocation {
        use crate::core::query::catalog::QueryOperation;
        use crate::core::query::template::TemplateValues;

        QueryInvocation {
            operation: QueryOperation::Update,
            values: TemplateValues::new()
                .with(Placeholder::TableName, "AM_USAGE")
                .with(Placeholder::ColumnName, "USERNAME")
                .with(Placeholder::CurrentValue, "admin")
                .with(Placeholder::PseudonymValue, "p1"),
        }
    }

    #[tokio::test]
    async fn test_open_begins_transaction() {
        let (registry, calls) = registry("PostgreSQL", false);
        let session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.dialect().product_name, "PostgreSQL");
        assert_eq!(calls.all(), vec!["begin".to_string()]);
    }

    #[tokio::test]
    async fn test_open_without_mappings_closes_connection() {
        let (registry, calls) = registry("Oracle", false);
        let result = Session::open(&registry, "db", &QueryCatalog::builtin()).await;

        assert!(matches!(result, Err(ForgetError::DatasourceInit { .. })));
        assert_eq!(calls.all(), vec!["close".to_string()]);
    }

    #[tokio::test]
    async fn test_table_exists_uses_probe() {
        let (registry, _calls) = registry("PostgreSQL", false);
        let mut session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        assert!(session.table_exists(&SqlIdentifier::new("PRESENT").unwrap()).await);
        assert!(!session.table_exists(&SqlIdentifier::new("ABSENT").unwrap()).await);
    }

    #[tokio::test]
    async fn test_execute_binds_parameters() {
        let (registry, calls) = registry("PostgreSQL", false);
        let mut session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        assert_eq!(session.execute(&update()).await.unwrap(), 1);
        assert!(calls
            .all()
            .contains(&"execute UPDATE AM_USAGE SET USERNAME = $1 WHERE USERNAME = $2".to_string()));
    }

    #[tokio::test]
    async fn test_execute_failure_is_query_execution_error() {
        let (registry, _calls) = registry("PostgreSQL", true);
        let mut session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        match session.execute(&update()).await {
            Err(ForgetError::QueryExecution { database, table, message }) => {
                assert_eq!(database, "db");
                assert_eq!(table, "AM_USAGE");
                assert!(message.contains("constraint violated"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_commit_then_close() {
        let (registry, calls) = registry("PostgreSQL", false);
        let mut session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        session.commit().await.unwrap();
        assert_eq!(session.state(), SessionState::Committed);
        session.close().await;
        session.close().await;

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            calls.all(),
            vec!["begin".to_string(), "commit".to_string(), "close".to_string()]
        );
    }

    #[tokio::test]
    async fn test_close_rolls_back_open_session() {
        let (registry, calls) = registry("PostgreSQL", false);
        let mut session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        session.close().await;
        assert_eq!(
            calls.all(),
            vec!["begin".to_string(), "rollback".to_string(), "close".to_string()]
        );
    }

    #[tokio::test]
    async fn test_commit_after_close_is_noop() {
        let (registry, calls) = registry("PostgreSQL", false);
        let mut session = Session::open(&registry, "db", &QueryCatalog::builtin())
            .await
            .unwrap();

        session.close().await;
        assert!(session.commit().await.is_ok());
        assert!(session.rollback().await.is_ok());
        assert!(session.execute(&update()).await.is_err());
        assert!(!calls.all().contains(&"commit".to_string()));
    }
}
