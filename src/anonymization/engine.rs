//! Anonymization orchestrator
//!
//! This module provides the [`AnonymizationEngine`] that walks every configured
//! datasource in order and anonymizes one subject in each of them.
//!
//! # Execution Model
//!
//! For each datasource the engine:
//! - opens a [`Session`] (one connection, one transaction)
//! - probes each rule's table and skips rules whose table is missing
//! - selects a strategy with [`classify`] and executes its statements
//! - commits, or rolls back on a dry run
//!
//! The first failure inside a datasource rolls back everything that datasource
//! changed during the run, closes the session and stops the run. Datasources that
//! were already committed stay committed.
//!
//! # Examples
//!
//! ```no_run
//! use forgetme::adapters::database::create_datasource_registry;
//! use forgetme::anonymization::AnonymizationEngine;
//! use forgetme::config::load_config;
//! use forgetme::domain::Subject;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config(Path::new("forgetme.toml"))?;
//! let registry = create_datasource_registry(&config)?;
//! let engine = AnonymizationEngine::new(registry, config.query_catalog(), false);
//!
//! let subject = Subject::builder("alice").pseudonym(Some("anon1")).build()?;
//! match engine.run(&subject, &config.databases).await {
//!     Ok(report) => println!("{}", report.format_console()),
//!     Err(failure) => eprintln!("{}", failure.report.format_console()),
//! }
//! # Ok(())
//! # }
//! ```

use crate::adapters::database::traits::DatasourceRegistry;
use crate::anonymization::report::{
    DatasourceReport, RuleOutcome, RuleReport, RunFailure, RunReport, TransactionOutcome,
};
use crate::anonymization::strategy::{classify, SkipReason, Strategy};
use crate::core::query::catalog::QueryCatalog;
use crate::core::session::Session;
use crate::domain::rule::{ColumnType, DatasourceTarget, TableRule};
use crate::domain::subject::Subject;
use crate::domain::{ForgetError, Result};
use crate::{log_error_with_context, log_rule_applied, log_rule_skipped};
use std::sync::Arc;
use std::time::Instant;

/// Sequential, transactional anonymization over a set of datasources
pub struct AnonymizationEngine {
    registry: Arc<dyn DatasourceRegistry>,
    catalog: QueryCatalog,
    dry_run: bool,
}

impl AnonymizationEngine {
    /// Create a new engine
    ///
    /// With `dry_run` every statement still runs, but each datasource transaction
    /// is rolled back instead of committed.
    pub fn new(registry: Arc<dyn DatasourceRegistry>, catalog: QueryCatalog, dry_run: bool) -> Self {
        Self {
            registry,
            catalog,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Anonymize `subject` across `targets`, in order
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the report up to and including the failed
    /// rule when a datasource cannot be opened, a rule has no applicable strategy or
    /// a statement fails. Datasources after the failing one are not attempted.
    pub async fn run(
        &self,
        subject: &Subject,
        targets: &[DatasourceTarget],
    ) -> std::result::Result<RunReport, RunFailure> {
        let started = Instant::now();
        let mut report = RunReport::new(self.dry_run);

        tracing::info!(
            datasources = targets.len(),
            dry_run = self.dry_run,
            tenant_domain = %subject.tenant_domain(),
            "Starting anonymization run"
        );
        tracing::debug!(username = %subject.username(), "Run subject");

        for target in targets {
            let mut ds_report = DatasourceReport::new(&target.database_name);
            let result = self.process_datasource(subject, target, &mut ds_report).await;
            report.datasources.push(ds_report);

            if let Err(error) = result {
                log_error_with_context!(
                    &error,
                    format!("Anonymization aborted in datasource '{}'", target.database_name)
                );
                report.finish();
                return Err(RunFailure { report, error });
            }
        }

        report.finish();
        let totals = report.totals();
        tracing::info!(
            datasources = totals.datasources,
            rules_applied = totals.rules_applied,
            rules_skipped = totals.rules_skipped,
            rows_affected = totals.rows_affected,
            duration_ms = started.elapsed().as_millis() as u64,
            "Anonymization run completed"
        );

        Ok(report)
    }

    /// Runs every rule of one datasource inside its own transaction
    async fn process_datasource(
        &self,
        subject: &Subject,
        target: &DatasourceTarget,
        ds_report: &mut DatasourceReport,
    ) -> Result<()> {
        tracing::info!(
            datasource = %target.database_name,
            rules = target.table_entries.len(),
            "Processing datasource"
        );

        let mut session =
            Session::open(self.registry.as_ref(), &target.database_name, &self.catalog).await?;

        if let Err(e) = self
            .apply_rules(&mut session, subject, target, ds_report)
            .await
        {
            if let Err(rollback_error) = session.rollback().await {
                tracing::warn!(
                    datasource = %target.database_name,
                    error = %rollback_error,
                    "Rollback after failure did not complete"
                );
            }
            session.close().await;
            ds_report.outcome = TransactionOutcome::RolledBack;
            return Err(e);
        }

        let finished = if self.dry_run {
            session.rollback().await
        } else {
            session.commit().await
        };

        // A failed commit leaves the session open; close rolls it back.
        session.close().await;

        match finished {
            Ok(()) if self.dry_run => {
                ds_report.outcome = TransactionOutcome::RolledBack;
                tracing::info!(
                    datasource = %target.database_name,
                    rows_affected = ds_report.rows_affected(),
                    "Dry run, transaction rolled back"
                );
                Ok(())
            }
            Ok(()) => {
                ds_report.outcome = TransactionOutcome::Committed;
                tracing::info!(
                    datasource = %target.database_name,
                    rows_affected = ds_report.rows_affected(),
                    "Transaction committed"
                );
                Ok(())
            }
            Err(e) => {
                ds_report.outcome = TransactionOutcome::RolledBack;
                Err(ForgetError::QueryExecution {
                    database: target.database_name.clone(),
                    table: String::new(),
                    message: format!("Failed to finish transaction: {e}"),
                })
            }
        }
    }

    async fn apply_rules(
        &self,
        session: &mut Session,
        subject: &Subject,
        target: &DatasourceTarget,
        ds_report: &mut DatasourceReport,
    ) -> Result<()> {
        for rule in &target.table_entries {
            if !session.table_exists(&rule.table_name).await {
                log_rule_skipped!(
                    &target.database_name,
                    rule.table_name,
                    SkipReason::TableNotFound
                );
                ds_report.rules.push(RuleReport::new(
                    rule,
                    RuleOutcome::Skipped {
                        reason: SkipReason::TableNotFound,
                    },
                ));
                continue;
            }

            let outcome = Self::apply_rule(session, subject, rule).await;
            let failed = match outcome {
                Ok(outcome) => {
                    ds_report.rules.push(RuleReport::new(rule, outcome));
                    None
                }
                Err((outcome, error)) => {
                    ds_report.rules.push(RuleReport::new(rule, outcome));
                    Some(error)
                }
            };

            if let Some(error) = failed {
                return Err(error);
            }
        }

        Ok(())
    }

    /// Classifies and executes one rule
    ///
    /// On failure the returned outcome is the `Failed` line for the report.
    async fn apply_rule(
        session: &mut Session,
        subject: &Subject,
        rule: &TableRule,
    ) -> std::result::Result<RuleOutcome, (RuleOutcome, ForgetError)> {
        let datasource = session.datasource().to_string();

        let strategy = classify(subject, rule).map_err(|e| {
            (
                RuleOutcome::Failed {
                    strategy: None,
                    error: e.to_string(),
                },
                ForgetError::NoApplicableStrategy {
                    database: datasource.clone(),
                    rule: e.rule,
                },
            )
        })?;

        if let Strategy::Skip(reason) = strategy {
            log_rule_skipped!(&datasource, rule.table_name, reason);
            return Ok(RuleOutcome::Skipped { reason });
        }

        if rule.column_type == ColumnType::Ip && subject.ip().is_none() {
            tracing::warn!(
                datasource = %datasource,
                table = %rule.table_name,
                column = %rule.column_name,
                "No IP address given, only the username part of the rule is updated"
            );
        }

        let kind = strategy.kind();
        let mut rows_affected = 0;
        for invocation in strategy.invocations(&rule.table_name) {
            match session.execute(&invocation).await {
                Ok(rows) => rows_affected += rows,
                Err(e) => {
                    return Err((
                        RuleOutcome::Failed {
                            strategy: Some(kind),
                            error: e.to_string(),
                        },
                        e,
                    ));
                }
            }
        }

        if rows_affected == 0 {
            tracing::info!(
                datasource = %datasource,
                table = %rule.table_name,
                column = %rule.column_name,
                strategy = %kind,
                "No matching rows"
            );
        }
        log_rule_applied!(&datasource, rule.table_name, rule.column_name, kind, rows_affected);

        Ok(RuleOutcome::Applied {
            strategy: kind,
            rows_affected,
        })
    }
}
