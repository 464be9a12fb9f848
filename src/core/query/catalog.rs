//! Query catalog and per-dialect resolution
//!
//! The catalog maps each logical [`QueryOperation`] to a SQL template for a given
//! database product and version. A [`QueryResolver`] is built once per session for
//! the dialect reported by the connection.

use crate::adapters::database::traits::Dialect;
use crate::core::query::template::QueryTemplate;
use crate::domain::errors::ForgetError;
use crate::domain::result::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Version key used when no version-specific mapping matches
pub const DEFAULT_VERSION: &str = "default";

/// Logical query identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryOperation {
    /// Cheap probe used to decide whether a table exists
    TableCheck,
    /// Whole-value update of one column
    Update,
    /// Substring replacement restricted to rows containing the current value
    ReplaceAndUpdate,
    /// Substring replacement restricted by a LIKE pattern
    ReplaceEmailAndUpdate,
    /// Joint update of an IP column and its companion username column
    IpAndUsernameUpdate,
}

impl QueryOperation {
    pub const ALL: [QueryOperation; 5] = [
        QueryOperation::TableCheck,
        QueryOperation::Update,
        QueryOperation::ReplaceAndUpdate,
        QueryOperation::ReplaceEmailAndUpdate,
        QueryOperation::IpAndUsernameUpdate,
    ];

    /// Key of the operation in the `mappings` table
    pub fn key(&self) -> &'static str {
        match self {
            QueryOperation::TableCheck => "table-check",
            QueryOperation::Update => "update",
            QueryOperation::ReplaceAndUpdate => "replace-and-update",
            QueryOperation::ReplaceEmailAndUpdate => "replace-email-and-update",
            QueryOperation::IpAndUsernameUpdate => "ip-and-username-update",
        }
    }
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for QueryOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.key() == s)
            .ok_or_else(|| format!("Unknown query operation '{s}'"))
    }
}

/// Templates for one database product and version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMappings {
    /// Database product name, e.g. `PostgreSQL` (compared case-insensitively)
    #[serde(rename = "type")]
    pub database_type: String,

    /// Product version prefix, or `default`
    #[serde(default = "default_version")]
    pub version: String,

    /// Operation key to SQL template
    pub mappings: BTreeMap<String, String>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl QueryMappings {
    /// Checks that every operation is mapped and every template parses
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.database_type.trim().is_empty() {
            return Err("queries.type cannot be empty".to_string());
        }

        for key in self.mappings.keys() {
            QueryOperation::from_str(key).map_err(|e| {
                format!("queries[{} {}]: {e}", self.database_type, self.version)
            })?;
        }

        for operation in QueryOperation::ALL {
            let sql = self.mappings.get(operation.key()).ok_or_else(|| {
                format!(
                    "queries[{} {}] is missing a mapping for '{operation}'",
                    self.database_type, self.version
                )
            })?;
            QueryTemplate::new(operation, sql.clone())
                .placeholders()
                .map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    fn matches_type(&self, product_name: &str) -> bool {
        self.database_type.eq_ignore_ascii_case(product_name)
    }
}

/// All configured query mappings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryCatalog {
    entries: Vec<QueryMappings>,
}

impl QueryCatalog {
    pub fn new(entries: Vec<QueryMappings>) -> Self {
        Self { entries }
    }

    /// Built-in catalog with the PostgreSQL templates
    pub fn builtin() -> Self {
        Self::new(vec![builtin_postgresql()])
    }

    pub fn entries(&self) -> &[QueryMappings] {
        &self.entries
    }

    /// Picks the mappings for `dialect`
    ///
    /// An entry whose version is a prefix of the product version wins, the longest
    /// prefix first. Otherwise the entry with version `default` is used.
    fn select(&self, dialect: &Dialect) -> Option<&QueryMappings> {
        let candidates: Vec<&QueryMappings> = self
            .entries
            .iter()
            .filter(|entry| entry.matches_type(&dialect.product_name))
            .collect();

        candidates
            .iter()
            .filter(|entry| {
                !entry.version.eq_ignore_ascii_case(DEFAULT_VERSION)
                    && dialect.product_version.starts_with(entry.version.as_str())
            })
            .max_by_key(|entry| entry.version.len())
            .or_else(|| {
                candidates
                    .iter()
                    .find(|entry| entry.version.eq_ignore_ascii_case(DEFAULT_VERSION))
            })
            .copied()
    }
}

/// Resolves logical operations to templates for one dialect
#[derive(Debug, Clone)]
pub struct QueryResolver {
    dialect: Dialect,
    templates: BTreeMap<QueryOperation, QueryTemplate>,
}

impl QueryResolver {
    /// Builds the resolver for `dialect`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the catalog has no mappings for the
    /// dialect or the selected mappings lack an operation.
    pub fn for_dialect(catalog: &QueryCatalog, dialect: &Dialect) -> Result<Self> {
        let mappings = catalog.select(dialect).ok_or_else(|| {
            ForgetError::Configuration(format!(
                "No query mappings found for {} {}",
                dialect.product_name, dialect.product_version
            ))
        })?;

        let mut templates = BTreeMap::new();
        for operation in QueryOperation::ALL {
            let sql = mappings.mappings.get(operation.key()).ok_or_else(|| {
                ForgetError::Configuration(format!(
                    "No '{operation}' query mapping for {} {}",
                    dialect.product_name, dialect.product_version
                ))
            })?;
            templates.insert(operation, QueryTemplate::new(operation, sql.clone()));
        }

        tracing::debug!(
            product = %dialect.product_name,
            version = %dialect.product_version,
            mapping_version = %mappings.version,
            "Resolved query mappings"
        );

        Ok(Self {
            dialect: dialect.clone(),
            templates,
        })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn resolve(&self, operation: QueryOperation) -> Result<&QueryTemplate> {
        self.templates.get(&operation).ok_or_else(|| {
            ForgetError::Configuration(format!("No '{operation}' query mapping resolved"))
        })
    }
}

/// PostgreSQL templates shipped with the crate
pub fn builtin_postgresql() -> QueryMappings {
    let mut mappings = BTreeMap::new();
    mappings.insert(
        QueryOperation::TableCheck.key().to_string(),
        "SELECT 1 FROM {{TABLE_NAME}} LIMIT 1".to_string(),
    );
    mappings.insert(
        QueryOperation::Update.key().to_string(),
        "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = {{PSEUDONYM_VALUE}} \
         WHERE {{COLUMN_NAME}} = {{CURRENT_VALUE}}"
            .to_string(),
    );
    mappings.insert(
        QueryOperation::ReplaceAndUpdate.key().to_string(),
        "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = \
         REPLACE({{COLUMN_NAME}}, {{CURRENT_VALUE}}, {{REPLACE_VALUE}}) \
         WHERE STRPOS({{COLUMN_NAME}}, {{CURRENT_VALUE}}) > 0"
            .to_string(),
    );
    mappings.insert(
        QueryOperation::ReplaceEmailAndUpdate.key().to_string(),
        "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = \
         REPLACE({{COLUMN_NAME}}, {{CURRENT_VALUE}}, {{PSEUDONYM_VALUE}}) \
         WHERE {{COLUMN_NAME}} LIKE {{LIKE_VALUE}}"
            .to_string(),
    );
    mappings.insert(
        QueryOperation::IpAndUsernameUpdate.key().to_string(),
        "UPDATE {{TABLE_NAME}} SET {{IP_COLUMN_NAME}} = {{IP_PSEUDONYM_VALUE}}, \
         {{IP_USERNAME_COLUMN_NAME}} = {{PSEUDONYM_VALUE}} \
         WHERE {{IP_COLUMN_NAME}} = {{CURRENT_IP_VALUE}} \
         AND {{IP_USERNAME_COLUMN_NAME}} = {{CURRENT_IP_USERNAME_VALUE}}"
            .to_string(),
    );

    QueryMappings {
        database_type: "PostgreSQL".to_string(),
        version: DEFAULT_VERSION.to_string(),
        mappings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect(name: &str, version: &str) -> Dialect {
        Dialect {
            product_name: name.to_string(),
            product_version: version.to_string(),
        }
    }

    fn mappings_with_version(version: &str, update_sql: &str) -> QueryMappings {
        let mut mappings = builtin_postgresql();
        mappings.version = version.to_string();
        mappings
            .mappings
            .insert("update".to_string(), update_sql.to_string());
        mappings
    }

    #[test]
    fn test_operation_keys_parse() {
        for operation in QueryOperation::ALL {
            assert_eq!(operation.key().parse::<QueryOperation>(), Ok(operation));
        }
        assert!("delete".parse::<QueryOperation>().is_err());
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        assert!(builtin_postgresql().validate().is_ok());
    }

    #[test]
    fn test_missing_operation_rejected() {
        let mut mappings = builtin_postgresql();
        mappings.mappings.remove("ip-and-username-update");
        let err = mappings.validate().unwrap_err();
        assert!(err.contains("ip-and-username-update"));
    }

    #[test]
    fn test_unknown_operation_key_rejected() {
        let mut mappings = builtin_postgresql();
        mappings
            .mappings
            .insert("truncate".to_string(), "TRUNCATE {{TABLE_NAME}}".to_string());
        assert!(mappings.validate().is_err());
    }

    #[test]
    fn test_resolve_type_case_insensitive() {
        let resolver =
            QueryResolver::for_dialect(&QueryCatalog::builtin(), &dialect("postgresql", "16.2"))
                .unwrap();
        let template = resolver.resolve(QueryOperation::TableCheck).unwrap();
        assert_eq!(template.sql(), "SELECT 1 FROM {{TABLE_NAME}} LIMIT 1");
    }

    #[test]
    fn test_version_prefix_preferred_over_default() {
        let catalog = QueryCatalog::new(vec![
            builtin_postgresql(),
            mappings_with_version("9", "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = {{PSEUDONYM_VALUE}} WHERE {{COLUMN_NAME}} = {{CURRENT_VALUE}} -- v9"),
        ]);

        let old = QueryResolver::for_dialect(&catalog, &dialect("PostgreSQL", "9.6.24")).unwrap();
        assert!(old
            .resolve(QueryOperation::Update)
            .unwrap()
            .sql()
            .ends_with("-- v9"));

        let new = QueryResolver::for_dialect(&catalog, &dialect("PostgreSQL", "16.1")).unwrap();
        assert!(!new
            .resolve(QueryOperation::Update)
            .unwrap()
            .sql()
            .ends_with("-- v9"));
    }

    #[test]
    fn test_unknown_product_fails() {
        let result = QueryResolver::for_dialect(&QueryCatalog::builtin(), &dialect("H2", "2.1"));
        assert!(matches!(result, Err(ForgetError::Configuration(_))));
    }

    #[test]
    fn test_mappings_from_toml() {
        let mappings: QueryMappings = toml::from_str(
            r#"
type = "MySQL"

[mappings]
table-check = "SELECT 1 FROM {{TABLE_NAME}} LIMIT 1"
update = "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = {{PSEUDONYM_VALUE}} WHERE {{COLUMN_NAME}} = {{CURRENT_VALUE}}"
"#,
        )
        .unwrap();

        assert_eq!(mappings.database_type, "MySQL");
        assert_eq!(mappings.version, DEFAULT_VERSION);
        assert!(mappings.validate().is_err());
    }
}
