//! Anonymize command implementation
//!
//! This module implements the `anonymize` command: it builds the subject from the
//! command line, runs the engine over every configured database and reports the
//! outcome through the exit code.

use crate::adapters::database::create_datasource_registry;
use crate::anonymization::audit::AuditLogger;
use crate::anonymization::{AnonymizationEngine, RunReport};
use crate::config::{load_config, ForgetConfig};
use crate::domain::subject::{PseudonymSource, Subject};
use chrono::Utc;
use clap::Args;

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Username of the user to forget
    #[arg(short = 'U', long)]
    pub username: String,

    /// Replacement for the username (generated when omitted)
    #[arg(short = 'P', long)]
    pub pseudonym: Option<String>,

    /// Tenant domain of the user (defaults to the super tenant domain)
    #[arg(short = 'T', long)]
    pub tenant_domain: Option<String>,

    /// Email address of the user
    #[arg(short = 'E', long)]
    pub user_email: Option<String>,

    /// IP address of the user
    #[arg(short = 'I', long)]
    pub user_ip: Option<String>,

    /// Derive a generated pseudonym as the SHA-256 of the username instead of a UUID
    #[arg(long)]
    pub sha256: bool,

    /// Run every update, then roll back instead of committing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl AnonymizeArgs {
    /// Execute the anonymize command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting anonymize command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("{e}");
                return Ok(e.exit_code());
            }
        };

        let subject = match self.build_subject(&config) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Invalid user input");
                eprintln!("{e}");
                return Ok(e.exit_code());
            }
        };

        if subject.pseudonym_generated() {
            println!(
                "[{}] Generated pseudonym for the user: {}",
                Utc::now().to_rfc3339(),
                subject.pseudonym()
            );
        }
        if subject.ip().is_some() {
            println!(
                "[{}] Generated pseudonym for the IP address: {}",
                Utc::now().to_rfc3339(),
                subject.ip_pseudonym()
            );
        }

        let dry_run = self.dry_run || config.application.dry_run;
        if dry_run {
            tracing::info!("Dry run mode enabled - every transaction will be rolled back");
            println!("🔍 DRY RUN MODE - No changes will be committed");
            println!();
        }

        if config.databases.is_empty() {
            tracing::warn!("No databases configured, nothing to anonymize");
        }

        // Confirmation prompt (unless --yes or dry-run)
        if !self.yes && !dry_run && !Self::confirm(&config, &subject)? {
            println!("Anonymization cancelled.");
            return Ok(0);
        }

        let audit = match AuditLogger::from_config(&config.anonymization.audit) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize audit log");
                eprintln!("Failed to initialize audit log: {e:#}");
                return Ok(2);
            }
        };

        let registry = match create_datasource_registry(&config) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create datasources");
                eprintln!("Failed to initialize datasources: {e}");
                return Ok(e.exit_code());
            }
        };

        let engine = AnonymizationEngine::new(registry, config.query_catalog(), dry_run);

        match engine.run(&subject, &config.databases).await {
            Ok(report) => {
                self.record(&audit, &subject, &report, None);
                self.print_report(&report)?;
                Ok(0)
            }
            Err(failure) => {
                let message = failure.error.to_string();
                self.record(&audit, &subject, &failure.report, Some(&message));
                self.print_report(&failure.report)?;
                eprintln!("❌ Anonymization failed: {message}");
                Ok(failure.exit_code())
            }
        }
    }

    fn build_subject(&self, config: &ForgetConfig) -> crate::domain::Result<Subject> {
        let source = if self.sha256 {
            PseudonymSource::Sha256
        } else {
            PseudonymSource::Uuid
        };
        let range = config
            .anonymization
            .ip_range()
            .map_err(|e| crate::domain::ForgetError::Configuration(format!("{e:#}")))?;

        Subject::builder(self.username.as_str())
            .pseudonym(self.pseudonym.as_deref())
            .tenant_domain(self.tenant_domain.as_deref())
            .email(self.user_email.as_deref())
            .ip(self.user_ip.as_deref())
            .super_tenant_domain(config.anonymization.super_tenant_domain.as_str())
            .ip_range(range)
            .pseudonym_source(source)
            .build()
    }

    fn confirm(config: &ForgetConfig, subject: &Subject) -> anyhow::Result<bool> {
        use std::io::{self, Write};

        println!("Anonymization:");
        println!("  Tenant domain: {}", subject.tenant_domain());
        println!("  Email: {}", if subject.email().is_some() { "provided" } else { "none" });
        println!("  IP address: {}", if subject.ip().is_some() { "provided" } else { "none" });
        println!(
            "  Databases: {:?}",
            config
                .databases
                .iter()
                .map(|d| d.database_name.as_str())
                .collect::<Vec<_>>()
        );
        println!("  Table rules: {}", config.rule_count());
        println!();
        print!("Proceed with anonymization? Committed changes cannot be undone. [y/N]: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        Ok(input.trim().eq_ignore_ascii_case("y"))
    }

    fn record(&self, audit: &AuditLogger, subject: &Subject, report: &RunReport, error: Option<&str>) {
        if let Err(e) = audit.log_run(subject, report, error) {
            tracing::warn!(error = %e, "Failed to write audit entry");
        }
    }

    fn print_report(&self, report: &RunReport) -> anyhow::Result<()> {
        if self.json {
            println!("{}", report.format_json()?);
        } else {
            print!("{}", report.format_console());
        }
        Ok(())
    }
}
