//! Table rules and datasource targets
//!
//! A [`TableRule`] declares one column (or one IP/username column pair) holding
//! identifying data, and how the value is stored in it. Rules are grouped per
//! database in a [`DatasourceTarget`] and processed in declaration order.

use crate::domain::ids::SqlIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of the identifying value stored in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Username, optionally suffixed with the tenant domain
    #[default]
    #[serde(alias = "PLAIN")]
    Plain,
    /// Email address, possibly one of several comma-joined addresses
    #[serde(alias = "EMAIL")]
    Email,
    /// IP address, paired with a username column or embedded in a message
    #[serde(alias = "IP")]
    Ip,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Plain => write!(f, "PLAIN"),
            ColumnType::Email => write!(f, "EMAIL"),
            ColumnType::Ip => write!(f, "IP"),
        }
    }
}

/// One column to anonymize within a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRule {
    /// Table holding the identifying data
    pub table_name: SqlIdentifier,

    /// Column holding the identifying data (the IP column for IP rules)
    pub column_name: SqlIdentifier,

    /// Semantic type of the stored value
    #[serde(default)]
    pub column_type: ColumnType,

    /// The value is embedded in a larger text instead of stored atomically
    #[serde(default)]
    pub text_replace: bool,

    /// In this table, super tenant usernames carry the `@tenant` suffix
    #[serde(default)]
    pub super_tenant_username_has_tenant_domain: bool,

    /// Literal text framing the embedded value on the left
    #[serde(default)]
    pub replace_text_prefix: String,

    /// Literal text framing the embedded value on the right
    #[serde(default)]
    pub replace_text_suffix: String,

    /// Companion username column of an IP rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_username_column_name: Option<SqlIdentifier>,
}

impl TableRule {
    /// Creates an atomic PLAIN rule for `table.column`
    pub fn new(table: &str, column: &str) -> Result<Self, String> {
        Ok(Self {
            table_name: SqlIdentifier::new(table)?,
            column_name: SqlIdentifier::new(column)?,
            column_type: ColumnType::Plain,
            text_replace: false,
            super_tenant_username_has_tenant_domain: false,
            replace_text_prefix: String::new(),
            replace_text_suffix: String::new(),
            ip_username_column_name: None,
        })
    }

    /// Sets the column type
    pub fn with_column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Marks the rule as a text-replace rule framed by `prefix` and `suffix`
    pub fn with_text_replace(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.text_replace = true;
        self.replace_text_prefix = prefix.into();
        self.replace_text_suffix = suffix.into();
        self
    }

    /// Sets whether super tenant usernames carry the tenant domain in this table
    pub fn with_super_tenant_domain_suffix(mut self, has_suffix: bool) -> Self {
        self.super_tenant_username_has_tenant_domain = has_suffix;
        self
    }

    /// Sets the companion username column of an IP rule
    pub fn with_ip_username_column(mut self, column: &str) -> Result<Self, String> {
        self.ip_username_column_name = Some(SqlIdentifier::new(column)?);
        Ok(self)
    }

    /// Checks structural requirements that do not depend on the subject
    pub fn validate(&self) -> Result<(), String> {
        if self.column_type == ColumnType::Ip
            && !self.text_replace
            && self.ip_username_column_name.is_none()
        {
            return Err(format!(
                "table entry [{self}] is an atomic IP rule and requires ip_username_column_name"
            ));
        }
        Ok(())
    }
}

impl fmt::Display for TableRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table={}, column={}, type={}, text_replace={}, super_tenant_username_has_tenant_domain={}",
            self.table_name,
            self.column_name,
            self.column_type,
            self.text_replace,
            self.super_tenant_username_has_tenant_domain
        )?;
        if let Some(ref column) = self.ip_username_column_name {
            write!(f, ", ip_username_column={column}")?;
        }
        Ok(())
    }
}

/// Rules for one configured database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceTarget {
    /// Name of the registered datasource
    pub database_name: String,

    /// Rules in execution order
    #[serde(default)]
    pub table_entries: Vec<TableRule>,
}
