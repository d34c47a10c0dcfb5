//! Postgres record store
//!
//! Each gateway operation opens its own `PgConnection` (no pool) and closes
//! it when done. Batch inserts run inside one transaction; every row is
//! wrapped in a savepoint so a unique violation only discards that row.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use super::credentials::ConnectionTarget;
use super::{sql, RecordStore, StoreConnection, StoreFault};
use crate::config::{TableName, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::filter::FilterCriteria;
use crate::record::{Record, RecordChanges, RecordId};

const ROW_SAVEPOINT: &str = "separator_row";

/// Opens one Postgres connection per operation
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    connect_timeout: Duration,
}

impl PgRecordStore {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for PgRecordStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }
}

/// Connection options for a resolved target
pub fn connect_options(target: &ConnectionTarget) -> Result<PgConnectOptions, StoreFault> {
    match target {
        ConnectionTarget::Url(url) => PgConnectOptions::from_str(url).map_err(|e| {
            StoreFault::Configuration(format!(
                "Invalid connection string for {}: {}",
                target.describe(),
                e
            ))
        }),
        ConnectionTarget::Fields(fields) => {
            let (host, port) = fields
                .host_and_port()
                .map_err(|e| StoreFault::Configuration(e.to_string()))?;
            let mut options = PgConnectOptions::new().host(&host).database(&fields.database);
            if let Some(port) = port {
                options = options.port(port);
            }
            if let Some(ref username) = fields.username {
                options = options.username(username);
            }
            if let Some(ref password) = fields.password {
                options = options.password(password);
            }
            Ok(options)
        },
    }
}

/// Map a driver error onto the store fault classes
///
/// Classification uses SQLSTATE codes and the driver's error kinds, never
/// message text.
pub fn classify(err: sqlx::Error) -> StoreFault {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreFault::DuplicateKey(db.message().to_string())
        },
        sqlx::Error::Database(ref db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            // 08: connection exception, 28: invalid authorization, 3D000: unknown database
            if code.starts_with("08") || code.starts_with("28") || code == "3D000" {
                StoreFault::Connection(err.to_string())
            } else {
                StoreFault::Query(err.to_string())
            }
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreFault::Connection(err.to_string()),
        sqlx::Error::Configuration(_) => StoreFault::Configuration(err.to_string()),
        _ => StoreFault::Query(err.to_string()),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    type Connection = PgStoreConnection;

    async fn connect(&self, target: &ConnectionTarget) -> Result<Self::Connection, StoreFault> {
        let options = connect_options(target)?;
        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                StoreFault::Connection(format!(
                    "Timed out after {}s connecting to {}",
                    self.connect_timeout.as_secs(),
                    target.describe()
                ))
            })?
            .map_err(classify)?;

        tracing::debug!(endpoint = %target.describe(), "Opened store connection");
        Ok(PgStoreConnection {
            conn,
            in_transaction: false,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    order_number: Option<String>,
    separator_name: Option<String>,
    date_of_separation: Option<NaiveDateTime>,
    analysis: Option<bool>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            id: Some(row.id),
            order_number: row.order_number.unwrap_or_default(),
            separator_name: row.separator_name.unwrap_or_default(),
            date_of_separation: row.date_of_separation,
            analysis: row.analysis.unwrap_or(false),
        }
    }
}

pub struct PgStoreConnection {
    conn: PgConnection,
    in_transaction: bool,
}

impl PgStoreConnection {
    async fn execute(&mut self, statement: &str) -> Result<(), StoreFault> {
        sqlx::query(statement)
            .execute(&mut self.conn)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

#[async_trait]
impl StoreConnection for PgStoreConnection {
    async fn table_columns(&mut self, table: &TableName) -> Result<Vec<String>, StoreFault> {
        sql::table_columns(table)
            .build_query_scalar::<String>()
            .fetch_all(&mut self.conn)
            .await
            .map_err(classify)
    }

    async fn create_table(&mut self, table: &TableName) -> Result<(), StoreFault> {
        let ddl = sql::create_table(table);
        self.execute(&ddl).await
    }

    async fn select(
        &mut self,
        table: &TableName,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Record>, StoreFault> {
        let rows = sql::select_records(table, criteria)
            .build_query_as::<RecordRow>()
            .fetch_all(&mut self.conn)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn begin(&mut self) -> Result<(), StoreFault> {
        self.execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn insert(&mut self, table: &TableName, record: &Record) -> Result<RecordId, StoreFault> {
        if !self.in_transaction {
            return sql::insert_record(table, record)
                .build_query_scalar::<i64>()
                .fetch_one(&mut self.conn)
                .await
                .map_err(classify);
        }

        self.execute(&format!("SAVEPOINT {}", ROW_SAVEPOINT)).await?;
        let inserted = sql::insert_record(table, record)
            .build_query_scalar::<i64>()
            .fetch_one(&mut self.conn)
            .await
            .map_err(classify);

        match inserted {
            Ok(id) => {
                self.execute(&format!("RELEASE SAVEPOINT {}", ROW_SAVEPOINT)).await?;
                Ok(id)
            },
            Err(fault) if fault.is_duplicate() => {
                self.execute(&format!("ROLLBACK TO SAVEPOINT {}", ROW_SAVEPOINT)).await?;
                Err(fault)
            },
            Err(fault) => Err(fault),
        }
    }

    async fn commit(&mut self) -> Result<(), StoreFault> {
        self.execute("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreFault> {
        let result = self.execute("ROLLBACK").await;
        self.in_transaction = false;
        result
    }

    async fn update(
        &mut self,
        table: &TableName,
        id: RecordId,
        changes: &RecordChanges,
    ) -> Result<u64, StoreFault> {
        let Some(mut qb) = sql::update_record(table, id, changes) else {
            return Ok(0);
        };
        qb.build()
            .execute(&mut self.conn)
            .await
            .map(|done| done.rows_affected())
            .map_err(classify)
    }

    async fn delete(&mut self, table: &TableName, id: RecordId) -> Result<u64, StoreFault> {
        sql::delete_record(table, id)
            .build()
            .execute(&mut self.conn)
            .await
            .map(|done| done.rows_affected())
            .map_err(classify)
    }

    async fn close(mut self) {
        if self.in_transaction {
            if let Err(e) = self.rollback().await {
                tracing::warn!(error = %e, "Rollback of abandoned transaction failed");
            }
        }
        if let Err(e) = self.conn.close().await {
            tracing::warn!(error = %e, "Closing store connection failed");
        }
    }
}
