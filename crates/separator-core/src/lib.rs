//! Separator Core Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Import, filtering and store reconciliation for separator records.
//!
//! # Overview
//!
//! - **Normalization**: [`normalize`] turns loosely named, loosely typed
//!   tabular input ([`RawTable`]) into canonical [`Record`]s.
//! - **Filtering**: [`filter`] applies optional predicates and picks the
//!   default view shown after a load.
//! - **Store access**: [`RecordGateway`] fetches, saves, updates and deletes
//!   records, resolving credentials through a fallback chain and tolerating
//!   duplicate rows during batch saves.
//! - **Reconciliation**: [`Reconciler`] applies edits to a loaded
//!   [`RecordSet`] and the store, reporting where the two diverge.
//!
//! # Example
//!
//! ```no_run
//! use separator_core::{import, ProcessConfig, RecordGateway, SaveControl};
//!
//! #[tokio::main]
//! async fn main() -> separator_common::Result<()> {
//!     let set = import::import_file("separators.csv")?;
//!     let gateway = RecordGateway::postgres(ProcessConfig::from_env())?;
//!     let report = gateway.save(set.original(), SaveControl::new()).await?;
//!     println!("saved {} skipped {}", report.saved, report.skipped);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod filter;
pub mod gateway;
pub mod import;
pub mod normalize;
pub mod reconcile;
pub mod record;
pub mod secrets;
pub mod store;
pub mod table;

// Re-export commonly used types
pub use config::{ProcessConfig, StoreSettings, TableName};
pub use filter::{apply_filters, default_view, FilterCriteria};
pub use gateway::{ReadOnlyGateway, RecordGateway, SaveControl, SaveProgress, SaveReport};
pub use normalize::{normalize, normalize_at};
pub use reconcile::{EditTarget, ReconcileReport, Reconciler, RecordEdit, StoreFailure};
pub use record::{Record, RecordChanges, RecordId, RecordSet};
pub use secrets::{KeyVaultClient, SecretError, SecretStore, StaticSecretStore};
pub use store::{MemoryRecordStore, PgRecordStore, RecordStore, StoreConnection, StoreFault};
pub use table::{CellValue, RawTable};
