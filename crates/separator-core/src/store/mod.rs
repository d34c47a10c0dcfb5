//! Record store seam
//!
//! [`RecordStore`] opens connections; a [`StoreConnection`] is owned by one
//! gateway operation at a time and released when the operation finishes.
//! Backends report failures as [`StoreFault`], which the gateway turns into
//! the public error taxonomy.

pub mod credentials;
pub mod memory;
pub mod postgres;
pub mod sql;

use async_trait::async_trait;
use thiserror::Error;

use separator_common::SeparatorError;

use crate::config::TableName;
use crate::filter::FilterCriteria;
use crate::record::{Record, RecordChanges, RecordId};

pub use credentials::{ConnectionTarget, CredentialFields, CredentialResolver, CredentialSource};
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

/// Columns the gateway depends on
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "id",
    "order_number",
    "separator_name",
    "date_of_separation",
    "analysis",
];

/// Backend failure, classified
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Query(String),

    /// A uniqueness constraint rejected the row
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}

impl StoreFault {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreFault::DuplicateKey(_))
    }

    /// Same fault with `context` prefixed to its message
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            StoreFault::Configuration(m) => StoreFault::Configuration(format!("{}: {}", context, m)),
            StoreFault::Connection(m) => StoreFault::Connection(format!("{}: {}", context, m)),
            StoreFault::Query(m) => StoreFault::Query(format!("{}: {}", context, m)),
            StoreFault::DuplicateKey(m) => StoreFault::DuplicateKey(format!("{}: {}", context, m)),
        }
    }

    /// Public error for a fault raised during `operation`
    ///
    /// A duplicate key only reaches this point outside of a batch save and
    /// is reported as a query error.
    pub fn into_error(self, operation: &'static str, record_id: Option<RecordId>) -> SeparatorError {
        match self {
            StoreFault::Configuration(message) => SeparatorError::configuration(message),
            StoreFault::Connection(message) => SeparatorError::connection(operation, message),
            StoreFault::Query(message) | StoreFault::DuplicateKey(message) => {
                SeparatorError::query(operation, record_id, message)
            },
        }
    }
}

/// Opens connections to a record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    type Connection: StoreConnection;

    async fn connect(&self, target: &ConnectionTarget) -> Result<Self::Connection, StoreFault>;
}

/// One exclusively owned connection
///
/// Statements outside `begin`/`commit` run in autocommit mode. Inside a
/// transaction, a failed `insert` leaves the transaction usable: the
/// backend isolates each row so the caller can skip it and continue.
#[async_trait]
pub trait StoreConnection: Send {
    /// Column names of `table`; empty when the table does not exist
    async fn table_columns(&mut self, table: &TableName) -> Result<Vec<String>, StoreFault>;

    async fn create_table(&mut self, table: &TableName) -> Result<(), StoreFault>;

    /// Matching rows ordered by date of separation, newest first
    async fn select(
        &mut self,
        table: &TableName,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Record>, StoreFault>;

    async fn begin(&mut self) -> Result<(), StoreFault>;

    /// Insert one row and return the id the store assigned
    async fn insert(&mut self, table: &TableName, record: &Record) -> Result<RecordId, StoreFault>;

    async fn commit(&mut self) -> Result<(), StoreFault>;

    async fn rollback(&mut self) -> Result<(), StoreFault>;

    /// Number of rows changed
    async fn update(
        &mut self,
        table: &TableName,
        id: RecordId,
        changes: &RecordChanges,
    ) -> Result<u64, StoreFault>;

    /// Number of rows removed
    async fn delete(&mut self, table: &TableName, id: RecordId) -> Result<u64, StoreFault>;

    /// Release the connection; failures here are logged, not returned
    async fn close(self)
    where
        Self: Sized;
}
