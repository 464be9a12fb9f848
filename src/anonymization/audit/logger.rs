//! Audit logger for anonymization runs

use crate::anonymization::config::AuditConfig;
use crate::anonymization::report::{RuleOutcome, RunReport, TransactionOutcome};
use crate::domain::subject::Subject;
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Audit log entry, one per run
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    /// SHA-256 hash of the username (never log plaintext PII)
    username_hash: String,
    pseudonym_hash: String,
    tenant_domain: String,
    email_provided: bool,
    ip_provided: bool,
    dry_run: bool,
    status: &'static str,
    error: Option<String>,
    rows_affected: u64,
    datasources: Vec<AuditDatasource>,
}

/// Per-datasource counts
#[derive(Debug, Serialize)]
struct AuditDatasource {
    name: String,
    outcome: TransactionOutcome,
    applied: usize,
    skipped: usize,
    failed: usize,
    rows_affected: u64,
    rules: Vec<AuditRule>,
}

#[derive(Debug, Serialize)]
struct AuditRule {
    table: String,
    column: String,
    #[serde(flatten)]
    outcome: RuleOutcome,
}

/// Audit logger for anonymization runs
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(log_path: PathBuf, json_format: bool, enabled: bool) -> Result<Self> {
        if enabled {
            // Ensure parent directory exists
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            enabled,
        })
    }

    /// Create an audit logger from the `[anonymization.audit]` section
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        Self::new(config.log_path.clone(), config.json_format, config.enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log a finished run
    ///
    /// `error` is the message of the failure that aborted the run, if any.
    pub fn log_run(&self, subject: &Subject, report: &RunReport, error: Option<&str>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditLogEntry {
            timestamp: report
                .finished_at
                .unwrap_or(report.started_at)
                .to_rfc3339(),
            username_hash: self.hash_pii_value(subject.username()),
            pseudonym_hash: self.hash_pii_value(subject.pseudonym()),
            tenant_domain: subject.tenant_domain().to_string(),
            email_provided: subject.email().is_some(),
            ip_provided: subject.ip().is_some(),
            dry_run: report.dry_run,
            status: if error.is_some() { "failed" } else { "completed" },
            error: error.map(|e| self.redact(e, subject)),
            rows_affected: report.totals().rows_affected,
            datasources: report
                .datasources
                .iter()
                .map(|ds| AuditDatasource {
                    name: ds.datasource.clone(),
                    outcome: ds.outcome,
                    applied: ds.applied_count(),
                    skipped: ds.skipped_count(),
                    failed: ds.failed_count(),
                    rows_affected: ds.rows_affected(),
                    rules: ds
                        .rules
                        .iter()
                        .map(|r| AuditRule {
                            table: r.table.clone(),
                            column: r.column.clone(),
                            outcome: self.redact_outcome(&r.outcome, subject),
                        })
                        .collect(),
                })
                .collect(),
        };

        self.write_entry(&entry)
    }

    /// Driver messages can echo bound values; strip the subject's identifiers
    fn redact_outcome(&self, outcome: &RuleOutcome, subject: &Subject) -> RuleOutcome {
        match outcome {
            RuleOutcome::Failed { strategy, error } => RuleOutcome::Failed {
                strategy: *strategy,
                error: self.redact(error, subject),
            },
            other => other.clone(),
        }
    }

    /// Longest values first so that a username inside the email is not split
    fn redact(&self, message: &str, subject: &Subject) -> String {
        let mut values: Vec<&str> = [Some(subject.username()), subject.email(), subject.ip()]
            .into_iter()
            .flatten()
            .collect();
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));

        values
            .into_iter()
            .fold(message.to_string(), |text, value| replace_token(&text, value, "***"))
    }

    /// Hash a PII value using SHA-256
    fn hash_pii_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        format!("{result:x}")
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit log: {}", self.log_path.display()))?;

        if self.json_format {
            let json_line =
                serde_json::to_string(entry).context("Failed to serialize audit entry")?;
            writeln!(file, "{json_line}").context("Failed to write audit entry")?;
        } else {
            let datasources = entry
                .datasources
                .iter()
                .map(|ds| {
                    format!(
                        "{}={:?}({} applied, {} skipped, {} failed)",
                        ds.name, ds.outcome, ds.applied, ds.skipped, ds.failed
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                file,
                "[{}] User: {} | Tenant: {} | Status: {} | Dry run: {} | Rows: {} | Datasources: {}",
                entry.timestamp,
                entry.username_hash,
                entry.tenant_domain,
                entry.status,
                entry.dry_run,
                entry.rows_affected,
                datasources
            )
            .context("Failed to write audit entry")?;
        }

        Ok(())
    }
}

/// Replaces `needle` only where it is not part of a longer word
fn replace_token(text: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return text.to_string();
    }

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (start, _) in text.match_indices(needle) {
        let end = start + needle.len();
        let bounded_before = text[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let bounded_after = text[end..].chars().next().map_or(true, |c| !is_word(c));
        if bounded_before && bounded_after {
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }

    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::report::{DatasourceReport, RuleReport};
    use crate::anonymization::strategy::{SkipReason, StrategyKind};
    use crate::domain::rule::TableRule;
    use tempfile::tempdir;

    fn subject() -> Subject {
        Subject::builder("alice")
            .pseudonym(Some("anon1"))
            .email(Some("alice@example.com"))
            .build()
            .unwrap()
    }

    fn report(failed: bool) -> RunReport {
        let rule = TableRule::new("AM_USAGE", "USERNAME").unwrap();
        let mut ds = DatasourceReport::new("APIM_DB");
        ds.rules.push(RuleReport::new(
            &rule,
            RuleOutcome::Applied {
                strategy: StrategyKind::AtomicReplace,
                rows_affected: 2,
            },
        ));
        ds.rules.push(RuleReport::new(
            &rule,
            RuleOutcome::Skipped {
                reason: SkipReason::MissingEmail,
            },
        ));
        if failed {
            ds.rules.push(RuleReport::new(
                &rule,
                RuleOutcome::Failed {
                    strategy: Some(StrategyKind::AtomicReplace),
                    error: "duplicate key (USERNAME)=(alice)".to_string(),
                },
            ));
            ds.outcome = TransactionOutcome::RolledBack;
        } else {
            ds.outcome = TransactionOutcome::Committed;
        }

        let mut report = RunReport::new(false);
        report.datasources.push(ds);
        report.finish();
        report
    }

    #[test]
    fn test_audit_logger_creation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("nested").join("audit.log");

        let logger = AuditLogger::new(log_path, true, true).unwrap();
        assert!(logger.is_enabled());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_hash_pii_value() {
        let dir = tempdir().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), true, true).unwrap();

        let hash1 = logger.hash_pii_value("alice");
        let hash2 = logger.hash_pii_value("alice");
        let hash3 = logger.hash_pii_value("bob");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_log_run_json() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), true, true).unwrap();

        logger.log_run(&subject(), &report(false), None).unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let entry: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(entry["status"], "completed");
        assert_eq!(entry["rows_affected"], 2);
        assert_eq!(entry["email_provided"], true);
        assert_eq!(entry["datasources"][0]["outcome"], "COMMITTED");
        assert_eq!(entry["datasources"][0]["skipped"], 1);
        assert!(!content.contains("alice"));
    }

    #[test]
    fn test_log_run_failure_redacts_driver_message() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), true, true).unwrap();

        logger
            .log_run(&subject(), &report(true), Some("Failed to update table"))
            .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("\"status\":\"failed\""));
        assert!(content.contains("(USERNAME)=(***)"));
        assert!(!content.contains("alice"));
    }

    #[test]
    fn test_log_run_plain_text_appends() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), false, true).unwrap();

        logger.log_run(&subject(), &report(false), None).unwrap();
        logger.log_run(&subject(), &report(false), None).unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("APIM_DB=Committed(1 applied, 1 skipped, 0 failed)"));
        assert!(!content.contains("alice"));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path.clone(), true, false).unwrap();

        logger.log_run(&subject(), &report(false), None).unwrap();
        assert!(!log_path.exists());
    }

    #[test]
    fn test_short_username_only_redacted_as_whole_token() {
        let dir = tempdir().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.log"), true, true).unwrap();
        let subject = Subject::builder("a")
            .pseudonym(Some("anon1"))
            .email(Some("a@x.com"))
            .ip(Some("10.0.0.7"))
            .build()
            .unwrap();

        let message = "duplicate key value violates unique constraint: \
                       Key (username)=(a) already exists for a@x.com from 10.0.0.70";
        let redacted = logger.redact(message, &subject);

        assert_eq!(
            redacted,
            "duplicate key value violates unique constraint: \
             Key (username)=(***) already exists for *** from 10.0.0.70"
        );
    }

    #[test]
    fn test_replace_token_respects_word_boundaries() {
        assert_eq!(replace_token("alice alicia _alice", "alice", "***"), "*** alicia _alice");
        assert_eq!(replace_token("user:alice@wso2.com", "alice", "***"), "user:***@wso2.com");
        assert_eq!(replace_token("unchanged", "", "***"), "unchanged");
    }
}
