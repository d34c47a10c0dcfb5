//! In-process record store
//!
//! Mirrors the Postgres backend closely enough to exercise the gateway
//! without a server: ids are assigned in insertion order, the
//! (order_number, separator_name, date_of_separation) uniqueness rule is
//! enforced with SQL NULL semantics, and transactions journal their writes
//! and replay them onto the committed tables at commit. Ids are drawn like
//! a sequence and are not returned on rollback. Open connections are
//! counted so leaks are observable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::credentials::ConnectionTarget;
use super::{RecordStore, StoreConnection, StoreFault, REQUIRED_COLUMNS};
use crate::config::TableName;
use crate::filter::{self, FilterCriteria};
use crate::record::{Record, RecordChanges, RecordId};

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Record>,
    next_id: RecordId,
}

impl MemoryTable {
    fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn conflicts_with(&self, record: &Record, ignore: Option<RecordId>) -> bool {
        // NULL dates never compare equal, as in SQL
        let Some(date) = record.date_of_separation else {
            return false;
        };
        self.rows.iter().any(|row| {
            row.id != ignore
                && row.order_number == record.order_number
                && row.separator_name == record.separator_name
                && row.date_of_separation == Some(date)
        })
    }

    fn check_unique(&self, record: &Record) -> Result<(), StoreFault> {
        if self.conflicts_with(record, None) {
            return Err(StoreFault::DuplicateKey(format!(
                "order {} by {} already recorded",
                record.order_number, record.separator_name
            )));
        }
        Ok(())
    }

    fn insert(&mut self, record: &Record) -> Result<RecordId, StoreFault> {
        self.check_unique(record)?;
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(Record {
            id: Some(id),
            ..record.clone()
        });
        Ok(id)
    }

    /// Insert a row whose id was drawn earlier
    fn insert_with_id(&mut self, record: &Record, id: RecordId) -> Result<(), StoreFault> {
        self.check_unique(record)?;
        self.next_id = self.next_id.max(id + 1);
        self.rows.push(Record {
            id: Some(id),
            ..record.clone()
        });
        Ok(())
    }

    fn update(&mut self, id: RecordId, changes: &RecordChanges) -> Result<u64, StoreFault> {
        let Some(index) = self.rows.iter().position(|r| r.id == Some(id)) else {
            return Ok(0);
        };
        let mut updated = self.rows[index].clone();
        updated.apply(changes);
        if self.conflicts_with(&updated, Some(id)) {
            return Err(StoreFault::DuplicateKey(format!(
                "update of record {} collides with an existing row",
                id
            )));
        }
        self.rows[index] = updated;
        Ok(1)
    }

    fn delete(&mut self, id: RecordId) -> u64 {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != Some(id));
        (before - self.rows.len()) as u64
    }
}

type Tables = HashMap<String, MemoryTable>;

fn missing_table(key: &str) -> StoreFault {
    StoreFault::Query(format!("relation \"{}\" does not exist", key))
}

/// A write made inside an open transaction
#[derive(Debug, Clone)]
enum StagedWrite {
    CreateTable(String),
    Insert { table: String, record: Record, id: RecordId },
    Update { table: String, id: RecordId, changes: RecordChanges },
    Delete { table: String, id: RecordId },
}

impl StagedWrite {
    fn apply(&self, tables: &mut Tables) -> Result<u64, StoreFault> {
        match self {
            StagedWrite::CreateTable(key) => {
                tables
                    .entry(key.clone())
                    .or_insert_with(|| MemoryTable::new(REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()));
                Ok(0)
            },
            StagedWrite::Insert { table, record, id } => {
                let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
                t.insert_with_id(record, *id)?;
                Ok(1)
            },
            StagedWrite::Update { table, id, changes } => {
                let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
                t.update(*id, changes)
            },
            StagedWrite::Delete { table, id } => {
                let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
                Ok(t.delete(*id))
            },
        }
    }
}

/// Committed tables with `journal` replayed on top
fn replay(committed: &Tables, journal: &[StagedWrite]) -> Result<Tables, StoreFault> {
    let mut tables = committed.clone();
    for write in journal {
        write.apply(&mut tables)?;
    }
    Ok(tables)
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    open_connections: usize,
    connections_opened: usize,
}

/// Shared in-process table storage; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with `table` already created with the canonical columns
    pub fn with_table(table: &TableName) -> Self {
        Self::with_columns(table, &REQUIRED_COLUMNS)
    }

    /// Store with `table` created with arbitrary columns
    pub fn with_columns(table: &TableName, columns: &[&str]) -> Self {
        let store = Self::new();
        store.lock().tables.insert(
            table.to_string(),
            MemoryTable::new(columns.iter().map(|c| c.to_string()).collect()),
        );
        store
    }

    /// Insert rows directly, bypassing the gateway; duplicates are dropped
    pub fn seed(&self, table: &TableName, records: &[Record]) -> Vec<RecordId> {
        let mut state = self.lock();
        let table = state
            .tables
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable::new(REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()));
        records.iter().filter_map(|r| table.insert(r).ok()).collect()
    }

    /// Committed rows of `table`, in insertion order
    pub fn snapshot(&self, table: &TableName) -> Vec<Record> {
        self.lock()
            .tables
            .get(&table.to_string())
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Connections currently open
    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    /// Connections opened since the store was created
    pub fn connections_opened(&self) -> usize {
        self.lock().connections_opened
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    // A panic while holding the lock leaves plain data behind; keep using it
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    type Connection = MemoryConnection;

    async fn connect(&self, target: &ConnectionTarget) -> Result<Self::Connection, StoreFault> {
        let mut state = self.lock();
        state.open_connections += 1;
        state.connections_opened += 1;
        tracing::trace!(endpoint = %target.describe(), open = state.open_connections, "Opened memory connection");
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            journal: None,
        })
    }
}

/// Connection to a [`MemoryRecordStore`]; dropping it releases it
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    /// Writes of the open transaction, in order
    journal: Option<Vec<StagedWrite>>,
}

impl MemoryConnection {
    /// Run `f` against the tables this connection sees
    ///
    /// Inside a transaction that is a private replay of the journal, so
    /// changes made by `f` are not kept.
    fn read<T>(&self, f: impl FnOnce(&Tables) -> Result<T, StoreFault>) -> Result<T, StoreFault> {
        let state = lock_state(&self.state);
        match self.journal {
            Some(ref journal) => f(&replay(&state.tables, journal)?),
            None => f(&state.tables),
        }
    }

    /// Apply `write` now, or journal it when a transaction is open
    fn write(&mut self, write: StagedWrite) -> Result<u64, StoreFault> {
        let mut state = lock_state(&self.state);
        match self.journal {
            Some(ref mut journal) => {
                let affected = write.apply(&mut replay(&state.tables, journal)?)?;
                journal.push(write);
                Ok(affected)
            },
            None => write.apply(&mut state.tables),
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn table_columns(&mut self, table: &TableName) -> Result<Vec<String>, StoreFault> {
        let key = table.to_string();
        self.read(|tables| Ok(tables.get(&key).map(|t| t.columns.clone()).unwrap_or_default()))
    }

    async fn create_table(&mut self, table: &TableName) -> Result<(), StoreFault> {
        self.write(StagedWrite::CreateTable(table.to_string()))?;
        Ok(())
    }

    async fn select(
        &mut self,
        table: &TableName,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Record>, StoreFault> {
        let key = table.to_string();
        self.read(|tables| {
            let t = tables.get(&key).ok_or_else(|| missing_table(&key))?;
            let mut rows = filter::apply_filters(&t.rows, criteria);
            // date_of_separation DESC NULLS LAST, then id DESC
            rows.sort_by(|a, b| match (a.date_of_separation, b.date_of_separation) {
                (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.id.cmp(&a.id)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.id.cmp(&a.id),
            });
            Ok(rows)
        })
    }

    async fn begin(&mut self) -> Result<(), StoreFault> {
        if self.journal.is_some() {
            return Err(StoreFault::Query("transaction already in progress".to_string()));
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    async fn insert(&mut self, table: &TableName, record: &Record) -> Result<RecordId, StoreFault> {
        let key = table.to_string();
        let mut state = lock_state(&self.state);
        let Some(ref mut journal) = self.journal else {
            let t = state.tables.get_mut(&key).ok_or_else(|| missing_table(&key))?;
            return t.insert(record);
        };

        let mut view = replay(&state.tables, journal)?;
        let staged = view.get_mut(&key).ok_or_else(|| missing_table(&key))?;
        staged.check_unique(record)?;
        // Draw from the committed counter so concurrent transactions never share an id
        let id = match state.tables.get_mut(&key) {
            Some(committed) => {
                let id = committed.next_id.max(staged.next_id);
                committed.next_id = id + 1;
                id
            },
            None => staged.next_id,
        };
        journal.push(StagedWrite::Insert {
            table: key,
            record: record.clone(),
            id,
        });
        Ok(id)
    }

    async fn commit(&mut self) -> Result<(), StoreFault> {
        let journal = self
            .journal
            .take()
            .ok_or_else(|| StoreFault::Query("no transaction in progress".to_string()))?;
        let mut state = lock_state(&self.state);
        // Writes committed by other connections since begin are kept; a
        // conflict with them fails the commit and discards the journal
        let merged = replay(&state.tables, &journal)?;
        state.tables = merged;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreFault> {
        self.journal = None;
        Ok(())
    }

    async fn update(
        &mut self,
        table: &TableName,
        id: RecordId,
        changes: &RecordChanges,
    ) -> Result<u64, StoreFault> {
        self.write(StagedWrite::Update {
            table: table.to_string(),
            id,
            changes: changes.clone(),
        })
    }

    async fn delete(&mut self, table: &TableName, id: RecordId) -> Result<u64, StoreFault> {
        self.write(StagedWrite::Delete {
            table: table.to_string(),
            id,
        })
    }

    async fn close(self) {}
}
