//! Audit logging module
//!
//! Provides one audit entry per anonymization run, with hashed identifiers.

pub mod logger;

pub use logger::AuditLogger;
