//! Core transactional machinery for forgetme.
//!
//! # Modules
//!
//! - [`query`] - Query catalog, dialect resolution and placeholder binding
//! - [`session`] - One transactional connection per datasource
//!
//! # Session Lifecycle
//!
//! 1. **Open**: obtain a connection, resolve the dialect's templates, `BEGIN`
//! 2. **Probe**: check each rule's table inside the transaction
//! 3. **Execute**: run the bound update statements in rule order
//! 4. **Finish**: commit (or roll back on failure or dry run), then close

pub mod query;
pub mod session;

pub use session::{Session, SessionState};
