//! Test helpers for separator-core integration tests
//!
//! This module provides:
//! - In-memory gateways configured like a real deployment
//! - Record builders
//! - A store wrapper that injects failures and cancellations

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use separator_core::config::{TableName, KEY_CONNECTION_STRING};
use separator_core::store::credentials::ConnectionTarget;
use separator_core::store::memory::MemoryConnection;
use separator_core::{
    FilterCriteria, MemoryRecordStore, ProcessConfig, Record, RecordChanges, RecordGateway,
    RecordId, RecordStore, StoreConnection, StoreFault,
};

/// The default record table
pub fn table() -> TableName {
    TableName::default()
}

/// Configuration that resolves to the in-memory store
pub fn memory_config() -> ProcessConfig {
    ProcessConfig::from_pairs([(KEY_CONNECTION_STRING, "memory://")])
}

/// Gateway over a fresh in-memory store, plus a handle to the store
pub fn memory_gateway() -> (RecordGateway<MemoryRecordStore>, MemoryRecordStore) {
    let store = MemoryRecordStore::with_table(&table());
    let gateway = RecordGateway::from_config(store.clone(), memory_config())
        .expect("memory gateway configuration is valid");
    (gateway, store)
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .expect("valid test date")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// A local-only record dated in March 2024
pub fn record(order: &str, separator: &str, day: u32) -> Record {
    Record::new(order, separator, Some(at(2024, 3, day, 9)), false)
}

/// Ten distinct records where the fifth repeats the first
pub fn batch_with_duplicate() -> Vec<Record> {
    (1..=10)
        .map(|i| {
            if i == 5 {
                record("ORD-1", "Alice", 1)
            } else {
                record(&format!("ORD-{i}"), "Alice", i)
            }
        })
        .collect()
}

/// Failure and cancellation hooks for [`FaultyStore`]
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Inserting a record with this order number fails with a query fault
    pub fail_insert_order: Option<String>,
    /// Updates of these ids fail with a connection fault
    pub fail_update_ids: Vec<RecordId>,
    /// Connecting fails with a connection fault
    pub refuse_connections: bool,
    /// Cancel this token once this many rows were inserted
    pub cancel_after: Option<(usize, CancellationToken)>,
}

/// A memory store that misbehaves on request
#[derive(Debug, Clone)]
pub struct FaultyStore {
    pub inner: MemoryRecordStore,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryRecordStore, faults: Faults) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(faults)),
        }
    }

    fn faults(&self) -> Faults {
        self.faults.lock().expect("faults lock").clone()
    }
}

pub struct FaultyConnection {
    inner: MemoryConnection,
    faults: Faults,
    inserted: usize,
}

#[async_trait]
impl RecordStore for FaultyStore {
    type Connection = FaultyConnection;

    async fn connect(&self, target: &ConnectionTarget) -> Result<Self::Connection, StoreFault> {
        let faults = self.faults();
        if faults.refuse_connections {
            return Err(StoreFault::Connection("connection refused".to_string()));
        }
        Ok(FaultyConnection {
            inner: self.inner.connect(target).await?,
            faults,
            inserted: 0,
        })
    }
}

#[async_trait]
impl StoreConnection for FaultyConnection {
    async fn table_columns(&mut self, table: &TableName) -> Result<Vec<String>, StoreFault> {
        self.inner.table_columns(table).await
    }

    async fn create_table(&mut self, table: &TableName) -> Result<(), StoreFault> {
        self.inner.create_table(table).await
    }

    async fn select(
        &mut self,
        table: &TableName,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Record>, StoreFault> {
        self.inner.select(table, criteria).await
    }

    async fn begin(&mut self) -> Result<(), StoreFault> {
        self.inner.begin().await
    }

    async fn insert(&mut self, table: &TableName, record: &Record) -> Result<RecordId, StoreFault> {
        if self.faults.fail_insert_order.as_deref() == Some(record.order_number.as_str()) {
            return Err(StoreFault::Query("value too long for column".to_string()));
        }
        let id = self.inner.insert(table, record).await?;
        self.inserted += 1;
        if let Some((after, ref token)) = self.faults.cancel_after {
            if self.inserted >= after {
                token.cancel();
            }
        }
        Ok(id)
    }

    async fn commit(&mut self) -> Result<(), StoreFault> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), StoreFault> {
        self.inner.rollback().await
    }

    async fn update(
        &mut self,
        table: &TableName,
        id: RecordId,
        changes: &RecordChanges,
    ) -> Result<u64, StoreFault> {
        if self.faults.fail_update_ids.contains(&id) {
            return Err(StoreFault::Connection("server closed the connection".to_string()));
        }
        self.inner.update(table, id, changes).await
    }

    async fn delete(&mut self, table: &TableName, id: RecordId) -> Result<u64, StoreFault> {
        self.inner.delete(table, id).await
    }

    async fn close(self) {
        self.inner.close().await
    }
}

/// Gateway over a [`FaultyStore`] wrapping a fresh memory store
pub fn faulty_gateway(faults: Faults) -> (RecordGateway<FaultyStore>, MemoryRecordStore) {
    let memory = MemoryRecordStore::with_table(&table());
    let store = FaultyStore::new(memory.clone(), faults);
    let gateway = RecordGateway::from_config(store, memory_config())
        .expect("memory gateway configuration is valid");
    (gateway, memory)
}
