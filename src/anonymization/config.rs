//! Anonymization configuration

use crate::domain::subject::{
    IpRange, DEFAULT_IP_RANGE_END, DEFAULT_IP_RANGE_START, SUPER_TENANT_DOMAIN,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// `[anonymization]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Tenant domain treated as the default tenant
    #[serde(default = "default_super_tenant_domain")]
    pub super_tenant_domain: String,

    /// First address of the IP pseudonym range
    #[serde(default = "default_ip_range_start")]
    pub ip_pseudonym_range_start: Ipv4Addr,

    /// Last address of the IP pseudonym range
    #[serde(default = "default_ip_range_end")]
    pub ip_pseudonym_range_end: Ipv4Addr,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_super_tenant_domain() -> String {
    SUPER_TENANT_DOMAIN.to_string()
}

fn default_ip_range_start() -> Ipv4Addr {
    DEFAULT_IP_RANGE_START
}

fn default_ip_range_end() -> Ipv4Addr {
    DEFAULT_IP_RANGE_END
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            super_tenant_domain: default_super_tenant_domain(),
            ip_pseudonym_range_start: default_ip_range_start(),
            ip_pseudonym_range_end: default_ip_range_end(),
            audit: AuditConfig::default(),
        }
    }
}

impl AnonymizationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.super_tenant_domain.trim().is_empty() {
            anyhow::bail!("anonymization.super_tenant_domain cannot be empty");
        }

        self.ip_range().context("Invalid IP pseudonym range")?;

        self.audit.validate().context("Invalid audit configuration")?;

        Ok(())
    }

    /// The configured IP pseudonym range
    pub fn ip_range(&self) -> Result<IpRange> {
        Ok(IpRange::new(
            self.ip_pseudonym_range_start,
            self.ip_pseudonym_range_end,
        )?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("FORGETME_ANONYMIZATION_SUPER_TENANT_DOMAIN") {
            self.super_tenant_domain = val;
        }

        if let Ok(val) = std::env::var("FORGETME_ANONYMIZATION_IP_PSEUDONYM_RANGE_START") {
            self.ip_pseudonym_range_start = val
                .parse()
                .context("Invalid FORGETME_ANONYMIZATION_IP_PSEUDONYM_RANGE_START value")?;
        }

        if let Ok(val) = std::env::var("FORGETME_ANONYMIZATION_IP_PSEUDONYM_RANGE_END") {
            self.ip_pseudonym_range_end = val
                .parse()
                .context("Invalid FORGETME_ANONYMIZATION_IP_PSEUDONYM_RANGE_END value")?;
        }

        // Apply audit env overrides
        self.audit.apply_env_overrides()?;

        Ok(())
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_audit_json_format")]
    pub json_format: bool,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/forgetme.log")
}

fn default_audit_json_format() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
            json_format: default_audit_json_format(),
        }
    }
}

impl AuditConfig {
    /// Validate audit configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            anyhow::bail!("anonymization.audit.log_path cannot be empty when audit is enabled");
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("FORGETME_AUDIT_ENABLED") {
            self.enabled = val.parse().context("Invalid FORGETME_AUDIT_ENABLED value")?;
        }

        if let Ok(val) = std::env::var("FORGETME_AUDIT_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("FORGETME_AUDIT_JSON_FORMAT") {
            self.json_format = val
                .parse()
                .context("Invalid FORGETME_AUDIT_JSON_FORMAT value")?;
        }

        Ok(())
    }
}
