//! In-memory datasources for integration tests
//!
//! Statements are interpreted from the operation and placeholder values of the
//! bound query, so the real built-in templates are resolved and bound on every
//! call. Each connection works on a private copy of the tables between `begin`
//! and `commit`.

#![allow(dead_code)]

use async_trait::async_trait;
use forgetme::adapters::database::{DatabaseConnection, DatasourceRegistry, Dialect, ParamStyle};
use forgetme::core::query::{BoundQuery, Placeholder, QueryOperation};
use forgetme::domain::{ForgetError, Result, Subject};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// Fixed replacement IP used by [`subject`]
pub const IP_PSEUDONYM: Ipv4Addr = Ipv4Addr::new(240, 10, 20, 30);

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| ForgetError::Database(format!("column \"{column}\" does not exist")))
    }
}

type Tables = BTreeMap<String, Table>;

/// One database: committed tables plus a log of executed statements
#[derive(Default)]
pub struct MemoryDatabase {
    committed: Mutex<Tables>,
    statements: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    failing_tables: Mutex<Vec<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates (or replaces) a table with the given rows
    pub fn with_table(self: Arc<Self>, name: &str, columns: &[&str], rows: &[&[&str]]) -> Arc<Self> {
        let table = Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        };
        self.committed
            .lock()
            .unwrap()
            .insert(name.to_uppercase(), table);
        self
    }

    /// Every update statement touching `table` fails
    pub fn fail_on(self: Arc<Self>, table: &str) -> Arc<Self> {
        self.failing_tables.lock().unwrap().push(table.to_uppercase());
        self
    }

    /// Committed values of one column, in row order
    pub fn column(&self, table: &str, column: &str) -> Vec<String> {
        let tables = self.committed.lock().unwrap();
        let table = tables
            .get(&table.to_uppercase())
            .unwrap_or_else(|| panic!("no table {table}"));
        let index = table.column_index(column).unwrap();
        table.rows.iter().map(|row| row[index].clone()).collect()
    }

    /// SQL text and parameters of every executed update
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// `begin`, `commit`, `rollback` and `close` calls, in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn event(&self, name: &str) {
        self.events.lock().unwrap().push(name.to_string());
    }
}

pub struct MemoryConnection {
    database: Arc<MemoryDatabase>,
    dialect: Dialect,
    working: Option<Tables>,
}

impl MemoryConnection {
    /// Outside a transaction statements see a snapshot of the committed tables
    fn tables(&mut self) -> &mut Tables {
        let database = &self.database;
        self.working
            .get_or_insert_with(|| database.committed.lock().unwrap().clone())
    }

    fn apply(&mut self, query: &BoundQuery) -> Result<u64> {
        let values = query.values();
        let value = |p: Placeholder| values.get(p).unwrap_or_default().to_string();
        let table_name = value(Placeholder::TableName).to_uppercase();

        if self
            .database
            .failing_tables
            .lock()
            .unwrap()
            .contains(&table_name)
        {
            return Err(ForgetError::Database(format!(
                "could not update relation \"{table_name}\""
            )));
        }

        let table = self
            .tables()
            .get_mut(&table_name)
            .ok_or_else(|| ForgetError::Database(format!("relation \"{table_name}\" does not exist")))?;

        let mut changed = 0;
        match query.operation() {
            QueryOperation::TableCheck => {}
            QueryOperation::Update => {
                let column = table.column_index(&value(Placeholder::ColumnName))?;
                let current = value(Placeholder::CurrentValue);
                for row in &mut table.rows {
                    if row[column] == current {
                        row[column] = value(Placeholder::PseudonymValue);
                        changed += 1;
                    }
                }
            }
            QueryOperation::ReplaceAndUpdate => {
                let column = table.column_index(&value(Placeholder::ColumnName))?;
                let current = value(Placeholder::CurrentValue);
                for row in &mut table.rows {
                    if row[column].contains(&current) {
                        row[column] = row[column].replace(&current, &value(Placeholder::ReplaceValue));
                        changed += 1;
                    }
                }
            }
            QueryOperation::ReplaceEmailAndUpdate => {
                let column = table.column_index(&value(Placeholder::ColumnName))?;
                let current = value(Placeholder::CurrentValue);
                let like = value(Placeholder::LikeValue);
                for row in &mut table.rows {
                    if like_matches(&like, &row[column]) {
                        row[column] =
                            row[column].replace(&current, &value(Placeholder::PseudonymValue));
                        changed += 1;
                    }
                }
            }
            QueryOperation::IpAndUsernameUpdate => {
                let ip_column = table.column_index(&value(Placeholder::IpColumnName))?;
                let user_column = table.column_index(&value(Placeholder::IpUsernameColumnName))?;
                let current_ip = value(Placeholder::CurrentIpValue);
                let current_user = value(Placeholder::CurrentIpUsernameValue);
                for row in &mut table.rows {
                    if row[ip_column] == current_ip && row[user_column] == current_user {
                        row[ip_column] = value(Placeholder::IpPseudonymValue);
                        row[user_column] = value(Placeholder::PseudonymValue);
                        changed += 1;
                    }
                }
            }
        }

        Ok(changed)
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Numbered
    }

    async fn begin(&mut self) -> Result<()> {
        self.database.event("begin");
        self.working = Some(self.database.committed.lock().unwrap().clone());
        Ok(())
    }

    async fn probe(&mut self, query: &BoundQuery) -> bool {
        let table = query
            .values()
            .get(Placeholder::TableName)
            .unwrap_or_default()
            .to_uppercase();
        self.tables().contains_key(&table)
    }

    async fn execute(&mut self, query: &BoundQuery) -> Result<u64> {
        self.database
            .statements
            .lock()
            .unwrap()
            .push(format!("{} {:?}", query.sql(), query.params()));
        self.apply(query)
    }

    async fn commit(&mut self) -> Result<()> {
        self.database.event("commit");
        if let Some(tables) = self.working.take() {
            *self.database.committed.lock().unwrap() = tables;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.database.event("rollback");
        self.working = None;
        Ok(())
    }

    async fn close(&mut self) {
        self.database.event("close");
        self.working = None;
    }
}

/// Registry over named in-memory databases
#[derive(Default)]
pub struct MemoryRegistry {
    databases: BTreeMap<String, Arc<MemoryDatabase>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, database: Arc<MemoryDatabase>) -> Self {
        self.databases.insert(name.to_uppercase(), database);
        self
    }

    pub fn into_arc(self) -> Arc<dyn DatasourceRegistry> {
        Arc::new(self)
    }
}

#[async_trait]
impl DatasourceRegistry for MemoryRegistry {
    fn contains(&self, name: &str) -> bool {
        self.databases.contains_key(&name.to_uppercase())
    }

    fn names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    async fn connect(&self, name: &str) -> Result<Box<dyn DatabaseConnection>> {
        let database = self
            .databases
            .get(&name.to_uppercase())
            .ok_or_else(|| ForgetError::DatasourceInit {
                datasource: name.to_string(),
                message: "Unknown datasource".to_string(),
            })?;
        Ok(Box::new(MemoryConnection {
            database: Arc::clone(database),
            dialect: Dialect::new("PostgreSQL", "16.2"),
            working: None,
        }))
    }
}

/// SQL `LIKE` with `%` and `_` wildcards, no escapes
pub fn like_matches(pattern: &str, value: &str) -> bool {
    fn matches(pattern: &[char], value: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some(('%', rest)) => (0..=value.len()).any(|skip| matches(rest, &value[skip..])),
            Some(('_', rest)) => !value.is_empty() && matches(rest, &value[1..]),
            Some((c, rest)) => value.first() == Some(c) && matches(rest, &value[1..]),
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();
    matches(&pattern, &value)
}

/// Subject with a fixed pseudonym and IP pseudonym
pub fn subject(
    username: &str,
    pseudonym: &str,
    tenant_domain: Option<&str>,
    email: Option<&str>,
    ip: Option<&str>,
) -> Subject {
    Subject::builder(username)
        .pseudonym(Some(pseudonym))
        .tenant_domain(tenant_domain)
        .email(email)
        .ip(ip)
        .ip_pseudonym(IP_PSEUDONYM)
        .build()
        .expect("valid subject")
}
