//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::ForgetConfig;
use crate::domain::errors::ForgetError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ForgetConfig
/// 4. Applies environment variable overrides (FORGETME_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`ForgetError::Configuration`] if the file cannot be read, a referenced
/// environment variable is missing, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use forgetme::config::loader::load_config;
///
/// let config = load_config("forgetme.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ForgetConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ForgetError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ForgetError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration from TOML text
///
/// # Errors
///
/// Same as [`load_config`] minus the file access errors.
pub fn parse_config(contents: &str) -> Result<ForgetConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ForgetConfig = toml::from_str(&contents)
        .map_err(|e| ForgetError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ForgetError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied unchanged.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ForgetError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(ForgetError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using FORGETME_* prefix
///
/// Environment variables follow the pattern: FORGETME_<SECTION>_<KEY>
/// For example: FORGETME_APPLICATION_LOG_LEVEL, FORGETME_LOGGING_LOCAL_PATH
fn apply_env_overrides(config: &mut ForgetConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("FORGETME_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("FORGETME_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Anonymization and audit overrides
    config
        .anonymization
        .apply_env_overrides()
        .map_err(|e| ForgetError::Configuration(format!("{e:#}")))?;

    // Logging overrides
    if let Ok(val) = std::env::var("FORGETME_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("FORGETME_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("FORGETME_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
