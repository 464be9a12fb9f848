// forgetme - Transactional username, email and IP anonymization
// Copyright (c) 2025 Forgetme Contributors
// Licensed under the MIT License

//! # forgetme - right-to-be-forgotten anonymization
//!
//! forgetme replaces a user's identifying data (username, email address, IP address)
//! with pseudonyms across several relational databases and many tables, one
//! transaction per database.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Selecting** the update for each configured column from how the value is stored
//! - **Resolving** SQL templates per database product and version
//! - **Executing** the updates with bound parameters inside a per-database transaction
//! - **Reporting** which strategy fired for each rule and how many rows changed
//!
//! ## Architecture
//!
//! forgetme follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`anonymization`] - Strategy selection, orchestration, reporting and audit
//! - [`core`] - Query catalog, template binding and transactional sessions
//! - [`adapters`] - Datasource abstraction and the PostgreSQL implementation
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forgetme::adapters::database::create_datasource_registry;
//! use forgetme::anonymization::AnonymizationEngine;
//! use forgetme::config::load_config;
//! use forgetme::domain::Subject;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("forgetme.toml")?;
//!     let registry = create_datasource_registry(&config)?;
//!     let engine = AnonymizationEngine::new(registry, config.query_catalog(), false);
//!
//!     let subject = Subject::builder("alice")
//!         .tenant_domain(Some("wso2.com"))
//!         .email(Some("alice@example.com"))
//!         .build()?;
//!
//!     let report = engine.run(&subject, &config.databases).await?;
//!     println!("{}", report.format_console());
//!     Ok(())
//! }
//! ```
//!
//! ## Strategies
//!
//! Each table rule resolves to exactly one of:
//!
//! - **Atomic replace**: `UPDATE t SET c = pseudonym WHERE c = username`
//! - **Substring replace**: in-place replacement within a text column, four times for
//!   comma-joined email lists
//! - **Dual column replace**: an IP column and its username column in one statement
//! - **Skip**: the rule needs an email and none was given, or the table is missing
//!
//! See [`anonymization::strategy`] for the full decision table.
//!
//! ## Error Handling
//!
//! Library code returns [`domain::ForgetError`]. A failed run returns an
//! [`anonymization::RunFailure`] that carries the partial report:
//!
//! ```rust,no_run
//! # use forgetme::anonymization::RunFailure;
//! # fn example(failure: RunFailure) {
//! eprintln!("{}", failure.report.format_console());
//! std::process::exit(failure.exit_code());
//! # }
//! ```

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
