//! Update strategy selection
//!
//! [`classify`] maps a subject and a table rule to the update that anonymizes the
//! rule's column. It is pure: no I/O, and the same inputs always give the same
//! strategy. The resulting [`Strategy`] expands into one or more
//! [`QueryInvocation`]s that a session executes.
//!
//! `u@d` below stands for `username@tenant_domain`, `p@d` for
//! `pseudonym@tenant_domain`.
//!
//! | column type | text replace | condition                          | strategy                        |
//! |-------------|--------------|------------------------------------|---------------------------------|
//! | PLAIN       | no           | default tenant, stored unsuffixed  | atomic `username -> pseudonym`  |
//! | PLAIN       | no           | otherwise                          | atomic `u@d -> p@d`             |
//! | PLAIN       | yes          | suffixed or other tenant           | substring `prefix+u@d+suffix`   |
//! | PLAIN       | yes          | default tenant, stored unsuffixed  | no applicable strategy          |
//! | EMAIL       | no           |                                    | no applicable strategy          |
//! | EMAIL       | yes          | no email                           | skip                            |
//! | EMAIL       | yes          | email                              | four positional substrings      |
//! | IP          | yes          | no IP                              | substring on the suffix         |
//! | IP          | yes          | IP                                 | substring `prefix+ip+suffix`    |
//! | IP          | no           | no IP                              | atomic on the username column   |
//! | IP          | no           | IP                                 | dual column                     |

use crate::core::query::catalog::QueryOperation;
use crate::core::query::template::{Placeholder, TemplateValues};
use crate::domain::ids::SqlIdentifier;
use crate::domain::rule::{ColumnType, TableRule};
use crate::domain::subject::Subject;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The rule's flag combination matches no modeled scenario
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no applicable update strategy for table entry [{rule}]")]
pub struct NoApplicableStrategy {
    /// Display form of the offending rule
    pub rule: String,
}

impl NoApplicableStrategy {
    fn for_rule(rule: &TableRule) -> Self {
        Self {
            rule: rule.to_string(),
        }
    }
}

/// Where an embedded value sits within its text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    /// Framed by the rule's literal prefix and suffix
    Embedded,
    /// The whole field
    Sole,
    /// First of several values
    First,
    /// Last of several values
    Last,
    /// Between other values
    Middle,
}

/// Why a rule was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// EMAIL rule and the subject has no email
    MissingEmail,
    /// The table does not exist in the database
    TableNotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEmail => write!(f, "user email not provided"),
            SkipReason::TableNotFound => write!(f, "table not found"),
        }
    }
}

/// Whole-value update of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicReplace {
    pub column: SqlIdentifier,
    pub current: String,
    pub replacement: String,
}

/// In-place substitution within a text column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringReplace {
    pub column: SqlIdentifier,
    pub position: TextPosition,
    pub current: String,
    pub replacement: String,
    /// Row filter; when absent rows containing `current` are updated
    pub like_pattern: Option<String>,
}

/// Joint update of an IP column and its companion username column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualColumnReplace {
    pub ip_column: SqlIdentifier,
    pub username_column: SqlIdentifier,
    pub current_ip: String,
    pub ip_pseudonym: String,
    pub current_username: String,
    pub pseudonym: String,
}

/// The selected update for one table rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    AtomicReplace(AtomicReplace),
    /// One to four substitutions, executed in order and independently
    SubstringReplace(Vec<SubstringReplace>),
    DualColumnReplace(DualColumnReplace),
    Skip(SkipReason),
}

/// Strategy tag used in reports and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    AtomicReplace,
    SubstringReplace,
    DualColumnReplace,
    Skip,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::AtomicReplace => "ATOMIC_REPLACE",
            StrategyKind::SubstringReplace => "SUBSTRING_REPLACE",
            StrategyKind::DualColumnReplace => "DUAL_COLUMN_REPLACE",
            StrategyKind::Skip => "SKIP",
        };
        write!(f, "{name}")
    }
}

/// One statement to run: a logical operation and its placeholder values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInvocation {
    pub operation: QueryOperation,
    pub values: TemplateValues,
}

impl QueryInvocation {
    /// The existence probe for `table`
    pub fn table_check(table: &SqlIdentifier) -> Self {
        Self {
            operation: QueryOperation::TableCheck,
            values: TemplateValues::new().with(Placeholder::TableName, table.as_str()),
        }
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::AtomicReplace(_) => StrategyKind::AtomicReplace,
            Strategy::SubstringReplace(_) => StrategyKind::SubstringReplace,
            Strategy::DualColumnReplace(_) => StrategyKind::DualColumnReplace,
            Strategy::Skip(_) => StrategyKind::Skip,
        }
    }

    /// Statements implementing the strategy on `table`, in execution order
    pub fn invocations(&self, table: &SqlIdentifier) -> Vec<QueryInvocation> {
        let base = || TemplateValues::new().with(Placeholder::TableName, table.as_str());

        match self {
            Strategy::AtomicReplace(atomic) => vec![QueryInvocation {
                operation: QueryOperation::Update,
                values: base()
                    .with(Placeholder::ColumnName, atomic.column.as_str())
                    .with(Placeholder::CurrentValue, atomic.current.as_str())
                    .with(Placeholder::PseudonymValue, atomic.replacement.as_str()),
            }],
            Strategy::SubstringReplace(parts) => parts
                .iter()
                .map(|part| {
                    let values = base()
                        .with(Placeholder::ColumnName, part.column.as_str())
                        .with(Placeholder::CurrentValue, part.current.as_str());
                    match part.like_pattern {
                        Some(ref like) => QueryInvocation {
                            operation: QueryOperation::ReplaceEmailAndUpdate,
                            values: values
                                .with(Placeholder::PseudonymValue, part.replacement.as_str())
                                .with(Placeholder::LikeValue, like.as_str()),
                        },
                        None => QueryInvocation {
                            operation: QueryOperation::ReplaceAndUpdate,
                            values: values
                                .with(Placeholder::ReplaceValue, part.replacement.as_str()),
                        },
                    }
                })
                .collect(),
            Strategy::DualColumnReplace(dual) => vec![QueryInvocation {
                operation: QueryOperation::IpAndUsernameUpdate,
                values: base()
                    .with(Placeholder::IpColumnName, dual.ip_column.as_str())
                    .with(Placeholder::IpUsernameColumnName, dual.username_column.as_str())
                    .with(Placeholder::CurrentIpValue, dual.current_ip.as_str())
                    .with(Placeholder::IpPseudonymValue, dual.ip_pseudonym.as_str())
                    .with(Placeholder::CurrentIpUsernameValue, dual.current_username.as_str())
                    .with(Placeholder::PseudonymValue, dual.pseudonym.as_str()),
            }],
            Strategy::Skip(_) => Vec::new(),
        }
    }
}

/// Selects the update strategy for `rule`
///
/// # Errors
///
/// Returns [`NoApplicableStrategy`] for flag combinations with no modeled update:
/// an atomic EMAIL rule, a PLAIN text rule for an unsuffixed default-tenant user,
/// or an IP rule without a username column.
pub fn classify(subject: &Subject, rule: &TableRule) -> Result<Strategy, NoApplicableStrategy> {
    match rule.column_type {
        ColumnType::Plain => classify_plain(subject, rule),
        ColumnType::Email => classify_email(subject, rule),
        ColumnType::Ip => classify_ip(subject, rule),
    }
}

fn classify_plain(subject: &Subject, rule: &TableRule) -> Result<Strategy, NoApplicableStrategy> {
    let stored_unsuffixed =
        subject.is_default_tenant() && !rule.super_tenant_username_has_tenant_domain;

    if !rule.text_replace {
        let (current, replacement) = if stored_unsuffixed {
            (subject.username().to_string(), subject.pseudonym().to_string())
        } else {
            (subject.username_with_domain(), subject.pseudonym_with_domain())
        };
        return Ok(Strategy::AtomicReplace(AtomicReplace {
            column: rule.column_name.clone(),
            current,
            replacement,
        }));
    }

    if stored_unsuffixed {
        return Err(NoApplicableStrategy::for_rule(rule));
    }

    Ok(Strategy::SubstringReplace(vec![SubstringReplace {
        column: rule.column_name.clone(),
        position: TextPosition::Embedded,
        current: framed(rule, &subject.username_with_domain()),
        replacement: framed(rule, &subject.pseudonym_with_domain()),
        like_pattern: None,
    }]))
}

fn classify_email(subject: &Subject, rule: &TableRule) -> Result<Strategy, NoApplicableStrategy> {
    if !rule.text_replace {
        return Err(NoApplicableStrategy::for_rule(rule));
    }

    let Some(email) = subject.email() else {
        return Ok(Strategy::Skip(SkipReason::MissingEmail));
    };

    let pseudonym = subject.pseudonym();
    let prefix = rule.replace_text_prefix.as_str();
    let suffix = rule.replace_text_suffix.as_str();
    let part = |position, current: String, replacement: String, like: String| SubstringReplace {
        column: rule.column_name.clone(),
        position,
        current,
        replacement,
        like_pattern: Some(like),
    };

    Ok(Strategy::SubstringReplace(vec![
        part(
            TextPosition::Sole,
            email.to_string(),
            pseudonym.to_string(),
            email.to_string(),
        ),
        part(
            TextPosition::First,
            format!("{email}{suffix}"),
            format!("{pseudonym}{suffix}"),
            format!("{email}{suffix}%"),
        ),
        part(
            TextPosition::Last,
            format!("{prefix}{email}"),
            format!("{prefix}{pseudonym}"),
            format!("%{prefix}{email}"),
        ),
        part(
            TextPosition::Middle,
            format!("{prefix}{email}{suffix}"),
            format!("{prefix}{pseudonym}{suffix}"),
            format!("%{prefix}{email}{suffix}%"),
        ),
    ]))
}

fn classify_ip(subject: &Subject, rule: &TableRule) -> Result<Strategy, NoApplicableStrategy> {
    let username_token = Placeholder::CurrentIpUsernameValue.token();
    let current_username = subject.username_with_domain();
    let pseudonym = subject.pseudonym_with_domain();
    let ip_pseudonym = subject.ip_pseudonym().to_string();

    if rule.text_replace {
        let (current, replacement) = match subject.ip() {
            None => (
                rule.replace_text_suffix.replace(&username_token, &current_username),
                rule.replace_text_suffix.replace(&username_token, &pseudonym),
            ),
            Some(ip) => (
                framed(rule, ip).replace(&username_token, &current_username),
                framed(rule, &ip_pseudonym).replace(&username_token, &pseudonym),
            ),
        };
        return Ok(Strategy::SubstringReplace(vec![SubstringReplace {
            column: rule.column_name.clone(),
            position: TextPosition::Embedded,
            current,
            replacement,
            like_pattern: None,
        }]));
    }

    let username_column = rule
        .ip_username_column_name
        .clone()
        .ok_or_else(|| NoApplicableStrategy::for_rule(rule))?;

    match subject.ip() {
        None => Ok(Strategy::AtomicReplace(AtomicReplace {
            column: username_column,
            current: current_username,
            replacement: pseudonym,
        })),
        Some(ip) => Ok(Strategy::DualColumnReplace(DualColumnReplace {
            ip_column: rule.column_name.clone(),
            username_column,
            current_ip: ip.to_string(),
            ip_pseudonym,
            current_username,
            pseudonym,
        })),
    }
}

fn framed(rule: &TableRule, value: &str) -> String {
    format!(
        "{}{}{}",
        rule.replace_text_prefix, value, rule.replace_text_suffix
    )
}
