//! Run reporting for anonymization
//!
//! This module records, per datasource and per rule, which strategy fired and how
//! many rows it touched, and formats the result for the console or as JSON.

use crate::anonymization::strategy::{SkipReason, StrategyKind};
use crate::domain::errors::ForgetError;
use crate::domain::rule::{ColumnType, TableRule};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// How a datasource's transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionOutcome {
    /// Still running, or aborted before a transaction was opened
    Pending,
    Committed,
    RolledBack,
}

/// Outcome of one table rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleOutcome {
    Applied {
        strategy: StrategyKind,
        rows_affected: u64,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        strategy: Option<StrategyKind>,
        error: String,
    },
}

/// Report line for one table rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub table: String,
    pub column: String,
    pub column_type: ColumnType,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

impl RuleReport {
    pub fn new(rule: &TableRule, outcome: RuleOutcome) -> Self {
        Self {
            table: rule.table_name.to_string(),
            column: rule.column_name.to_string(),
            column_type: rule.column_type,
            outcome,
        }
    }
}

/// Report for one datasource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasourceReport {
    pub datasource: String,
    pub outcome: TransactionOutcome,
    pub rules: Vec<RuleReport>,
}

impl DatasourceReport {
    pub fn new(datasource: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            outcome: TransactionOutcome::Pending,
            rules: Vec::new(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Applied { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Failed { .. }))
            .count()
    }

    pub fn rows_affected(&self) -> u64 {
        self.rules
            .iter()
            .map(|r| match r.outcome {
                RuleOutcome::Applied { rows_affected, .. } => rows_affected,
                _ => 0,
            })
            .sum()
    }
}

/// Aggregated counts over a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunTotals {
    pub datasources: usize,
    pub committed: usize,
    pub rules_applied: usize,
    pub rules_skipped: usize,
    pub rules_failed: usize,
    pub rows_affected: u64,
}

/// Report for a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub datasources: Vec<DatasourceReport>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            datasources: Vec::new(),
        }
    }

    /// Marks the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn totals(&self) -> RunTotals {
        self.datasources
            .iter()
            .fold(RunTotals::default(), |mut totals, ds| {
                totals.datasources += 1;
                if ds.outcome == TransactionOutcome::Committed {
                    totals.committed += 1;
                }
                totals.rules_applied += ds.applied_count();
                totals.rules_skipped += ds.skipped_count();
                totals.rules_failed += ds.failed_count();
                totals.rows_affected += ds.rows_affected();
                totals
            })
    }

    /// Format report for console output
    pub fn format_console(&self) -> String {
        let mut output = String::new();
        let totals = self.totals();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        if self.dry_run {
            output.push_str("              ANONYMIZATION REPORT (DRY RUN)                   \n");
        } else {
            output.push_str("                    ANONYMIZATION REPORT                       \n");
        }
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("📊 SUMMARY\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("  Datasources Processed: {}\n", totals.datasources));
        output.push_str(&format!("  Datasources Committed: {}\n", totals.committed));
        output.push_str(&format!("  Rules Applied:         {}\n", totals.rules_applied));
        output.push_str(&format!("  Rules Skipped:         {}\n", totals.rules_skipped));
        output.push_str(&format!("  Rules Failed:          {}\n", totals.rules_failed));
        output.push_str(&format!("  Rows Affected:         {}\n", totals.rows_affected));
        output.push('\n');

        for ds in &self.datasources {
            output.push_str(&format!("🗄  {} ({:?})\n", ds.datasource, ds.outcome));
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for rule in &ds.rules {
                let detail = match &rule.outcome {
                    RuleOutcome::Applied {
                        strategy,
                        rows_affected,
                    } => format!("{strategy}, {rows_affected} row(s)"),
                    RuleOutcome::Skipped { reason } => format!("SKIP, {reason}"),
                    RuleOutcome::Failed { error, .. } => format!("FAILED, {error}"),
                };
                output.push_str(&format!(
                    "  {:40} {}\n",
                    format!("{}.{} [{}]", rule.table, rule.column, rule.column_type),
                    detail
                ));
            }
            output.push('\n');
        }

        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output
    }

    /// Format report as JSON
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A run aborted by an error, with everything recorded up to the failure
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    /// Partial report, including the failed rule
    pub report: RunReport,
    #[source]
    pub error: ForgetError,
}

impl RunFailure {
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}
