//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use crate::core::query::catalog::{builtin_postgresql, QueryMappings};
use clap::Args;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "forgetme.toml")]
    pub output: String,

    /// Also write the built-in PostgreSQL query templates
    #[arg(long)]
    pub with_queries: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize)]
struct QueriesSection {
    queries: Vec<QueryMappings>,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing forgetme configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let mut config_content = Self::generate_config();
        if self.with_queries {
            config_content.push_str(&Self::generate_queries()?);
        }

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your datasources and table rules", self.output);
                println!("  2. Create a .env file with the connection strings:");
                println!("     - Set FORGETME_APIM_DB_URL");
                println!("  3. Validate configuration: forgetme validate-config");
                println!("  4. Try a dry run: forgetme anonymize --username <user> --dry-run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5)
            }
        }
    }

    /// Generate the sample configuration
    fn generate_config() -> String {
        r#"# forgetme Configuration File
# Replaces a user's username, email and IP address across databases.
# Every database is updated in its own transaction.

[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Roll back every transaction instead of committing
dry_run = false

[anonymization]
# Tenant whose usernames are usually stored without the @domain suffix
super_tenant_domain = "carbon.super"

# Range the replacement IP address is drawn from
ip_pseudonym_range_start = "240.0.0.1"
ip_pseudonym_range_end = "255.255.255.254"

[anonymization.audit]
enabled = true
log_path = "./audit/forgetme.log"
json_format = true

[logging]
local_enabled = true
local_path = "./logs"
# daily | hourly | never
local_rotation = "daily"

# ============================================================================
# Datasources
# ============================================================================
[[datasources]]
name = "APIM_DB"
connection_string = "${FORGETME_APIM_DB_URL}"
max_connections = 2
connection_timeout_seconds = 30
statement_timeout_seconds = 60

# ============================================================================
# Table rules, processed in order per database
# ============================================================================
[[databases]]
database_name = "APIM_DB"

# Username stored as-is (super tenant users without @carbon.super)
[[databases.table_entries]]
table_name = "AM_SUBSCRIBER"
column_name = "USER_ID"

# Username embedded in a message
[[databases.table_entries]]
table_name = "AM_ALERT_LOG"
column_name = "MESSAGE"
text_replace = true
super_tenant_username_has_tenant_domain = true
replace_text_prefix = "user "
replace_text_suffix = " exceeded"

# Comma separated email list
[[databases.table_entries]]
table_name = "AM_ALERT_EMAILLIST_DETAILS"
column_name = "EMAIL"
column_type = "email"
text_replace = true
replace_text_prefix = ","
replace_text_suffix = ","

# IP address paired with a username column
[[databases.table_entries]]
table_name = "AM_REQUEST_LOG"
column_name = "CLIENT_IP"
column_type = "ip"
ip_username_column_name = "USERNAME"
"#
        .to_string()
    }

    /// Generate the built-in query catalog as `[[queries]]` tables
    fn generate_queries() -> anyhow::Result<String> {
        let section = QueriesSection {
            queries: vec![builtin_postgresql()],
        };
        let mut out = String::new();
        out.push('\n');
        out.push_str("# ============================================================================\n");
        out.push_str("# Query templates per database product and version\n");
        out.push_str("# ============================================================================\n");
        out.push_str(&toml::to_string(&section)?);
        Ok(out)
    }
}
