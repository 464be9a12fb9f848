//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for forgetme using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// forgetme - transactional username, email and IP anonymization
#[derive(Parser, Debug)]
#[command(name = "forgetme")]
#[command(version, about, long_about = None)]
#[command(author = "Forgetme Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "forgetme.toml", env = "FORGETME_CONFIG", global = true)]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FORGETME_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Anonymize one user across all configured databases
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
