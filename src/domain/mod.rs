//! Domain models and types for forgetme.
//!
//! This module contains the core domain types: the [`Subject`] being anonymized,
//! the [`TableRule`]s describing where identifying data lives, validated SQL
//! identifiers and the error hierarchy.
//!
//! # Type Safety
//!
//! Table and column names are [`SqlIdentifier`]s. They are validated when the
//! configuration is deserialized, so an unchecked name can never reach a query:
//!
//! ```rust
//! use forgetme::domain::{SqlIdentifier, TableRule};
//!
//! # fn example() -> Result<(), String> {
//! let rule = TableRule::new("AM_ALERT", "USERNAME")?;
//! assert_eq!(rule.table_name, SqlIdentifier::new("AM_ALERT")?);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ForgetError>`]:
//!
//! ```rust
//! use forgetme::domain::{ForgetError, Result, Subject};
//!
//! fn example() -> Result<()> {
//!     let subject = Subject::builder("admin").ip(Some("not-an-ip")).build();
//!     assert!(matches!(subject, Err(ForgetError::InvalidInput(_))));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod errors;
pub mod ids;
pub mod result;
pub mod rule;
pub mod subject;

// Re-export commonly used types for convenience
pub use errors::ForgetError;
pub use ids::SqlIdentifier;
pub use result::Result;
pub use rule::{ColumnType, DatasourceTarget, TableRule};
pub use subject::{IpRange, PseudonymSource, Subject, SubjectBuilder, SUPER_TENANT_DOMAIN};
