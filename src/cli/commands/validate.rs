//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the forgetme configuration file.

use crate::config::{load_config, redact_connection_string};
use crate::core::query::catalog::QueryOperation;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also list every table rule
    #[arg(long)]
    pub show_rules: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading runs the full validation, so a configuration that loads is valid.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(e.exit_code());
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Super Tenant Domain: {}",
            config.anonymization.super_tenant_domain
        );
        println!(
            "  IP Pseudonym Range: {} - {}",
            config.anonymization.ip_pseudonym_range_start,
            config.anonymization.ip_pseudonym_range_end
        );
        println!(
            "  Audit Log: {}",
            if config.anonymization.audit.enabled {
                config.anonymization.audit.log_path.display().to_string()
            } else {
                "disabled".to_string()
            }
        );

        println!("  Datasources: {}", config.datasources.len());
        for datasource in &config.datasources {
            println!(
                "    - {} ({}, max {} connections)",
                datasource.name,
                redact_connection_string(&datasource.connection_string),
                datasource.max_connections
            );
        }

        println!(
            "  Databases: {} ({} table rules)",
            config.databases.len(),
            config.rule_count()
        );
        for target in &config.databases {
            println!(
                "    - {}: {} rules",
                target.database_name,
                target.table_entries.len()
            );
            if self.show_rules {
                for rule in &target.table_entries {
                    println!("        {rule}");
                }
            }
        }

        let catalog = config.query_catalog();
        if config.queries.is_empty() {
            println!("  Query Catalog: built-in PostgreSQL templates");
        } else {
            println!("  Query Catalog:");
            for entry in catalog.entries() {
                println!(
                    "    - {} {} ({} operations)",
                    entry.database_type,
                    entry.version,
                    QueryOperation::ALL.len()
                );
            }
        }
        println!();

        Ok(0)
    }
}
