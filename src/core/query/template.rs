//! Query templates with named placeholders
//!
//! Templates are plain SQL containing `{{NAME}}` tokens. Binding a template turns
//! identifier tokens (table and column names) into validated literal identifiers and
//! value tokens into driver parameters, so no value ever becomes part of the SQL text.

use crate::adapters::database::traits::ParamStyle;
use crate::core::query::catalog::QueryOperation;
use crate::domain::errors::ForgetError;
use crate::domain::ids::SqlIdentifier;
use crate::domain::result::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z_]+)\}\}").expect("placeholder pattern is valid"));

/// A named placeholder understood by query templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    TableName,
    ColumnName,
    CurrentValue,
    PseudonymValue,
    ReplaceValue,
    LikeValue,
    IpColumnName,
    IpUsernameColumnName,
    CurrentIpValue,
    IpPseudonymValue,
    CurrentIpUsernameValue,
}

impl Placeholder {
    pub const ALL: [Placeholder; 11] = [
        Placeholder::TableName,
        Placeholder::ColumnName,
        Placeholder::CurrentValue,
        Placeholder::PseudonymValue,
        Placeholder::ReplaceValue,
        Placeholder::LikeValue,
        Placeholder::IpColumnName,
        Placeholder::IpUsernameColumnName,
        Placeholder::CurrentIpValue,
        Placeholder::IpPseudonymValue,
        Placeholder::CurrentIpUsernameValue,
    ];

    /// Name between the braces, e.g. `TABLE_NAME`
    pub fn token_name(&self) -> &'static str {
        match self {
            Placeholder::TableName => "TABLE_NAME",
            Placeholder::ColumnName => "COLUMN_NAME",
            Placeholder::CurrentValue => "CURRENT_VALUE",
            Placeholder::PseudonymValue => "PSEUDONYM_VALUE",
            Placeholder::ReplaceValue => "REPLACE_VALUE",
            Placeholder::LikeValue => "LIKE_VALUE",
            Placeholder::IpColumnName => "IP_COLUMN_NAME",
            Placeholder::IpUsernameColumnName => "IP_USERNAME_COLUMN_NAME",
            Placeholder::CurrentIpValue => "CURRENT_IP_VALUE",
            Placeholder::IpPseudonymValue => "IP_PSEUDONYM_VALUE",
            Placeholder::CurrentIpUsernameValue => "CURRENT_IP_USERNAME_VALUE",
        }
    }

    /// Full token as written in templates, e.g. `{{TABLE_NAME}}`
    pub fn token(&self) -> String {
        format!("{{{{{}}}}}", self.token_name())
    }

    pub fn from_token_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.token_name() == name)
    }

    /// Identifier placeholders are substituted literally, all others are bound
    pub fn is_identifier(&self) -> bool {
        matches!(
            self,
            Placeholder::TableName
                | Placeholder::ColumnName
                | Placeholder::IpColumnName
                | Placeholder::IpUsernameColumnName
        )
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Values for the placeholders of one statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateValues(BTreeMap<Placeholder, String>);

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing any previous one
    pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.0.insert(placeholder, value.into());
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.0.get(&placeholder).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, &str)> {
        self.0.iter().map(|(p, v)| (*p, v.as_str()))
    }
}

/// SQL for one logical operation, as resolved for a dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    operation: QueryOperation,
    sql: String,
}

impl QueryTemplate {
    pub fn new(operation: QueryOperation, sql: impl Into<String>) -> Self {
        Self {
            operation,
            sql: sql.into(),
        }
    }

    pub fn operation(&self) -> QueryOperation {
        self.operation
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholders referenced by the template, in first-appearance order
    ///
    /// # Errors
    ///
    /// Returns a configuration error for tokens that are not known placeholders.
    pub fn placeholders(&self) -> Result<Vec<Placeholder>> {
        let mut found = Vec::new();
        for cap in PLACEHOLDER_RE.captures_iter(&self.sql) {
            let placeholder = Placeholder::from_token_name(&cap[1]).ok_or_else(|| {
                ForgetError::Configuration(format!(
                    "Unknown placeholder {{{{{}}}}} in '{}' query",
                    &cap[1], self.operation
                ))
            })?;
            if !found.contains(&placeholder) {
                found.push(placeholder);
            }
        }
        Ok(found)
    }

    /// Binds `values` into an executable statement
    ///
    /// With [`ParamStyle::Numbered`] a value placeholder used more than once reuses
    /// its parameter index. With [`ParamStyle::Positional`] each occurrence gets its
    /// own `?` parameter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the template references a placeholder
    /// without a value or an identifier value is not a valid SQL identifier.
    pub fn bind(&self, values: &TemplateValues, style: ParamStyle) -> Result<BoundQuery> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut params: Vec<String> = Vec::new();
        let mut numbered: Vec<Placeholder> = Vec::new();
        let mut last = 0;

        for cap in PLACEHOLDER_RE.captures_iter(&self.sql) {
            let token = cap.get(0).ok_or_else(|| {
                ForgetError::Configuration("Malformed placeholder match".to_string())
            })?;
            let placeholder = Placeholder::from_token_name(&cap[1]).ok_or_else(|| {
                ForgetError::Configuration(format!(
                    "Unknown placeholder {} in '{}' query",
                    token.as_str(),
                    self.operation
                ))
            })?;
            let value = values.get(placeholder).ok_or_else(|| {
                ForgetError::Configuration(format!(
                    "No value supplied for {placeholder} in '{}' query",
                    self.operation
                ))
            })?;

            sql.push_str(&self.sql[last..token.start()]);
            last = token.end();

            if placeholder.is_identifier() {
                let identifier = SqlIdentifier::new(value).map_err(ForgetError::Configuration)?;
                sql.push_str(identifier.as_str());
                continue;
            }

            match style {
                ParamStyle::Numbered => {
                    let index = match numbered.iter().position(|p| *p == placeholder) {
                        Some(index) => index,
                        None => {
                            numbered.push(placeholder);
                            params.push(value.to_string());
                            numbered.len() - 1
                        }
                    };
                    sql.push_str(&format!("${}", index + 1));
                }
                ParamStyle::Positional => {
                    params.push(value.to_string());
                    sql.push('?');
                }
            }
        }
        sql.push_str(&self.sql[last..]);

        Ok(BoundQuery {
            operation: self.operation,
            sql,
            params,
            values: values.clone(),
        })
    }
}

/// A statement ready for execution: final SQL plus its parameters in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    operation: QueryOperation,
    sql: String,
    params: Vec<String>,
    values: TemplateValues,
}

impl BoundQuery {
    pub fn operation(&self) -> QueryOperation {
        self.operation
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The named values the statement was bound from
    pub fn values(&self) -> &TemplateValues {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_template() -> QueryTemplate {
        QueryTemplate::new(
            QueryOperation::Update,
            "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = {{PSEUDONYM_VALUE}} WHERE {{COLUMN_NAME}} = {{CURRENT_VALUE}}",
        )
    }

    fn update_values() -> TemplateValues {
        TemplateValues::new()
            .with(Placeholder::TableName, "AM_USAGE")
            .with(Placeholder::ColumnName, "USERNAME")
            .with(Placeholder::CurrentValue, "admin")
            .with(Placeholder::PseudonymValue, "p1")
    }

    #[test]
    fn test_token_round_trip() {
        for placeholder in Placeholder::ALL {
            assert_eq!(
                Placeholder::from_token_name(placeholder.token_name()),
                Some(placeholder)
            );
        }
        assert_eq!(Placeholder::TableName.token(), "{{TABLE_NAME}}");
    }

    #[test]
    fn test_bind_numbered() {
        let bound = update_template()
            .bind(&update_values(), ParamStyle::Numbered)
            .unwrap();

        assert_eq!(
            bound.sql(),
            "UPDATE AM_USAGE SET USERNAME = $1 WHERE USERNAME = $2"
        );
        assert_eq!(bound.params(), &["p1".to_string(), "admin".to_string()]);
        assert_eq!(bound.operation(), QueryOperation::Update);
    }

    #[test]
    fn test_bind_numbered_reuses_index() {
        let template = QueryTemplate::new(
            QueryOperation::ReplaceAndUpdate,
            "UPDATE {{TABLE_NAME}} SET {{COLUMN_NAME}} = REPLACE({{COLUMN_NAME}}, {{CURRENT_VALUE}}, {{REPLACE_VALUE}}) WHERE STRPOS({{COLUMN_NAME}}, {{CURRENT_VALUE}}) > 0",
        );
        let values = TemplateValues::new()
            .with(Placeholder::TableName, "T")
            .with(Placeholder::ColumnName, "C")
            .with(Placeholder::CurrentValue, "a@b")
            .with(Placeholder::ReplaceValue, "x@b");

        let bound = template.bind(&values, ParamStyle::Numbered).unwrap();
        assert_eq!(
            bound.sql(),
            "UPDATE T SET C = REPLACE(C, $1, $2) WHERE STRPOS(C, $1) > 0"
        );
        assert_eq!(bound.params().len(), 2);
    }

    #[test]
    fn test_bind_positional() {
        let bound = update_template()
            .bind(&update_values(), ParamStyle::Positional)
            .unwrap();

        assert_eq!(
            bound.sql(),
            "UPDATE AM_USAGE SET USERNAME = ? WHERE USERNAME = ?"
        );
        assert_eq!(bound.params(), &["p1".to_string(), "admin".to_string()]);
    }

    #[test]
    fn test_values_never_enter_sql_text() {
        let values = update_values().with(Placeholder::CurrentValue, "x' OR '1'='1");
        let bound = update_template()
            .bind(&values, ParamStyle::Numbered)
            .unwrap();
        assert!(!bound.sql().contains("OR"));
        assert_eq!(bound.params()[1], "x' OR '1'='1");
    }

    #[test]
    fn test_missing_value_is_configuration_error() {
        let values = TemplateValues::new().with(Placeholder::TableName, "T");
        let result = update_template().bind(&values, ParamStyle::Numbered);
        assert!(matches!(result, Err(ForgetError::Configuration(_))));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let template = QueryTemplate::new(QueryOperation::TableCheck, "SELECT {{NOPE}} FROM t");
        assert!(template.placeholders().is_err());
        assert!(template
            .bind(&TemplateValues::new(), ParamStyle::Numbered)
            .is_err());
    }

    #[test]
    fn test_identifier_value_revalidated() {
        let values = update_values().with(Placeholder::TableName, "T; DROP TABLE T");
        let result = update_template().bind(&values, ParamStyle::Numbered);
        assert!(matches!(result, Err(ForgetError::Configuration(_))));
    }

    #[test]
    fn test_placeholders_in_order() {
        let found = update_template().placeholders().unwrap();
        assert_eq!(
            found,
            vec![
                Placeholder::TableName,
                Placeholder::ColumnName,
                Placeholder::PseudonymValue,
                Placeholder::CurrentValue
            ]
        );
    }
}
