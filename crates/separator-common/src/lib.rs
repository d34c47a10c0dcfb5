//! Separator Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error taxonomy and logging for the separator-records workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SeparatorError`] distinguishes configuration,
//!   connection, query, and validation failures so callers can render a
//!   precise message for each.
//! - **Logging**: [`logging`] wires `tracing` to the console and/or a daily
//!   rolling log file.
//!
//! # Example
//!
//! ```no_run
//! use separator_common::{Result, SeparatorError};
//!
//! fn require_table(name: &str) -> Result<()> {
//!     if name.trim().is_empty() {
//!         return Err(SeparatorError::configuration("table name is empty"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SeparatorError};
