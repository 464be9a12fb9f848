//! Anonymization module for forgetme
//!
//! This module replaces a subject's username, email and IP address across every
//! configured datasource, one transaction per datasource.
//!
//! # Architecture
//!
//! The anonymization pipeline consists of:
//! - **Strategy**: pure selection of the update for each table rule
//! - **Engine**: sequential orchestration over datasources and sessions
//! - **Report**: per rule outcome, strategy and affected row count
//! - **Audit**: structured log of each run with hashed identifiers
//!
//! # Usage
//!
//! ```rust,ignore
//! use forgetme::anonymization::AnonymizationEngine;
//!
//! let engine = AnonymizationEngine::new(registry, config.query_catalog(), false);
//! let report = engine.run(&subject, &config.databases).await?;
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod report;
pub mod strategy;

// Re-export main types
pub use config::{AnonymizationConfig, AuditConfig};
pub use engine::AnonymizationEngine;
pub use report::{
    DatasourceReport, RuleOutcome, RuleReport, RunFailure, RunReport, RunTotals,
    TransactionOutcome,
};
pub use strategy::{classify, NoApplicableStrategy, QueryInvocation, SkipReason, Strategy, StrategyKind};
