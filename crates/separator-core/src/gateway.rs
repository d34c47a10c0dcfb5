//! Record store gateway
//!
//! The only component that talks to the store. Every operation resolves
//! credentials, opens a connection, does its work and closes the connection
//! again on every exit path. Operations on one gateway instance are
//! serialized, so a connection is never shared between two of them.
//!
//! # Examples
//!
//! ```rust,ignore
//! use separator_core::{FilterCriteria, ProcessConfig, RecordGateway, SaveControl};
//!
//! let gateway = RecordGateway::postgres(ProcessConfig::from_env())?;
//! let recent = gateway.load_recent(7).await?;
//! let report = gateway.save(set.original(), SaveControl::new()).await?;
//! println!("saved {}, skipped {}", report.saved, report.skipped);
//! ```

use chrono::Local;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use separator_common::{Result, SeparatorError};

use crate::config::{ProcessConfig, StoreSettings, TableName};
use crate::filter::FilterCriteria;
use crate::record::{Record, RecordChanges, RecordId, RecordSet};
use crate::store::{
    CredentialResolver, PgRecordStore, RecordStore, StoreConnection, StoreFault, REQUIRED_COLUMNS,
};

/// Progress of a batch save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveProgress {
    /// Rows submitted so far
    pub processed: usize,
    /// Rows the batch will submit if not cancelled
    pub total: usize,
    /// Always within 0..=100
    pub percent: u8,
}

impl SaveProgress {
    fn new(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (processed.min(total) * 100 / total) as u8
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

/// Progress channel and cancellation signal for [`RecordGateway::save`]
///
/// Progress is sent over an unbounded channel so the saving task never
/// blocks on the receiver. Cancellation is checked between rows.
#[derive(Debug, Clone, Default)]
pub struct SaveControl {
    progress: Option<mpsc::UnboundedSender<SaveProgress>>,
    cancel: CancellationToken,
}

impl SaveControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<SaveProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the save when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn report(&self, progress: SaveProgress) {
        if let Some(ref sender) = self.progress {
            // A receiver that went away only means nobody is watching
            if sender.send(progress).is_err() {
                tracing::trace!("Progress receiver dropped");
            }
        }
    }
}

/// Outcome of a batch save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Rows inserted and committed
    pub saved: usize,
    /// Rows rejected as duplicates
    pub skipped: usize,
    /// Records that already had a store id and were not submitted
    pub already_persisted: usize,
    /// Rows never submitted because the save was cancelled
    pub not_submitted: usize,
    pub cancelled: bool,
    /// Ids assigned by the store, keyed by the record's index in the input
    pub assigned_ids: Vec<(usize, RecordId)>,
}

#[derive(Debug, Default)]
struct GatewayState {
    schema_verified: bool,
}

/// Fetch, save, update and delete against the record table
pub struct RecordGateway<S: RecordStore> {
    store: S,
    resolver: CredentialResolver,
    table: TableName,
    state: Mutex<GatewayState>,
}

impl RecordGateway<PgRecordStore> {
    /// Postgres-backed gateway configured from process configuration
    pub fn postgres(config: ProcessConfig) -> Result<Self> {
        let settings = StoreSettings::from_config(&config)?;
        let store = PgRecordStore::new(settings.connect_timeout);
        Self::from_settings(store, config, &settings)
    }
}

impl<S: RecordStore> RecordGateway<S> {
    pub fn new(store: S, resolver: CredentialResolver, table: TableName) -> Self {
        Self {
            store,
            resolver,
            table,
            state: Mutex::new(GatewayState::default()),
        }
    }

    /// Gateway over `store` with settings read from `config`
    pub fn from_config(store: S, config: ProcessConfig) -> Result<Self> {
        let settings = StoreSettings::from_config(&config)?;
        Self::from_settings(store, config, &settings)
    }

    pub fn from_settings(store: S, config: ProcessConfig, settings: &StoreSettings) -> Result<Self> {
        let resolver = CredentialResolver::from_settings(config, settings)?;
        Ok(Self::new(store, resolver, settings.table.clone()))
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restrict this gateway to read operations
    pub fn read_only(self) -> ReadOnlyGateway<S> {
        ReadOnlyGateway { inner: self }
    }

    /// Resolve credentials and connect, verifying the schema on first use
    async fn open(
        &self,
        operation: &'static str,
        state: &mut GatewayState,
        verify: bool,
    ) -> Result<S::Connection> {
        let (target, source) = self.resolver.resolve().await?;
        let mut conn = self.store.connect(&target).await.map_err(|fault| {
            tracing::error!(operation, source = %source, error = %fault, "Failed to connect to record store");
            fault.into_error(operation, None)
        })?;

        if verify && !state.schema_verified {
            if let Err(e) = self.check_schema(&mut conn, operation).await {
                conn.close().await;
                return Err(e);
            }
            state.schema_verified = true;
        }
        Ok(conn)
    }

    async fn check_schema(&self, conn: &mut S::Connection, operation: &'static str) -> Result<()> {
        let columns = conn
            .table_columns(&self.table)
            .await
            .map_err(|fault| fault.into_error(operation, None))?;

        if columns.is_empty() {
            return Err(SeparatorError::query(
                operation,
                None,
                format!("table {} does not exist", self.table),
            ));
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !columns.iter().any(|c| c.eq_ignore_ascii_case(required)))
            .collect();
        if !missing.is_empty() {
            tracing::error!(table = %self.table, missing = ?missing, "Record table schema mismatch");
            return Err(SeparatorError::query(
                operation,
                None,
                format!("table {} is missing columns: {}", self.table, missing.join(", ")),
            ));
        }

        tracing::debug!(table = %self.table, "Record table schema verified");
        Ok(())
    }

    /// Records matching `criteria`, newest first
    ///
    /// With explicit criteria the set remembers them so edits re-filter it
    /// the same way. Without criteria the set starts on the default view and
    /// falls back to it after edits.
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    pub async fn fetch(&self, criteria: &FilterCriteria) -> Result<RecordSet> {
        let mut state = self.state.lock().await;
        let mut conn = self.open("fetch", &mut state, true).await?;
        let rows = conn.select(&self.table, criteria).await;
        conn.close().await;

        let rows = rows.map_err(|fault| {
            tracing::error!(error = %fault, "Fetch failed");
            fault.into_error("fetch", None)
        })?;
        tracing::info!(rows = rows.len(), "Fetched records");

        if criteria.is_unconstrained() {
            return Ok(RecordSet::with_default_view(rows, Local::now().naive_local()));
        }
        let mut set = RecordSet::unfiltered(rows);
        set.apply_filters(criteria.clone());
        Ok(set)
    }

    /// Records dated within the last `days` days, today included
    pub async fn load_recent(&self, days: u64) -> Result<RecordSet> {
        let today = Local::now().date_naive();
        self.fetch(&FilterCriteria::trailing_days(today, days)).await
    }

    pub async fn load_all(&self) -> Result<RecordSet> {
        self.fetch(&FilterCriteria::new()).await
    }

    /// Insert every local-only record in `records`
    ///
    /// Rows are submitted in order inside one transaction. A duplicate row is
    /// skipped and the batch continues; any other failure rolls the whole
    /// batch back. Cancellation stops submission and commits what was
    /// already inserted.
    #[tracing::instrument(skip_all, fields(table = %self.table, records = records.len()))]
    pub async fn save(&self, records: &[Record], control: SaveControl) -> Result<SaveReport> {
        let pending: Vec<(usize, &Record)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_local_only())
            .collect();

        let mut report = SaveReport {
            already_persisted: records.len() - pending.len(),
            ..SaveReport::default()
        };

        if let Some((index, record)) = pending
            .iter()
            .find(|(_, r)| !r.blank_required_fields().is_empty())
        {
            return Err(SeparatorError::validation(format!(
                "record {} has blank {}",
                index + 1,
                record.blank_required_fields().join(" and ")
            )));
        }

        if pending.is_empty() {
            control.report(SaveProgress::new(0, 0));
            tracing::info!(already_persisted = report.already_persisted, "Nothing to save");
            return Ok(report);
        }

        let total = pending.len();
        let mut state = self.state.lock().await;
        let mut conn = self.open("save", &mut state, true).await?;

        if let Err(fault) = conn.begin().await {
            conn.close().await;
            return Err(fault.into_error("save", None));
        }

        for (n, (index, record)) in pending.iter().enumerate() {
            if control.is_cancelled() {
                report.cancelled = true;
                report.not_submitted = total - n;
                tracing::warn!(submitted = n, remaining = total - n, "Save cancelled");
                break;
            }

            match conn.insert(&self.table, record).await {
                Ok(id) => {
                    report.saved += 1;
                    report.assigned_ids.push((*index, id));
                },
                Err(fault) if fault.is_duplicate() => {
                    report.skipped += 1;
                    tracing::warn!(
                        row = index + 1,
                        order_number = %record.order_number,
                        error = %fault,
                        "Skipping duplicate record"
                    );
                },
                Err(fault) => {
                    tracing::error!(row = index + 1, error = %fault, "Save failed, rolling back batch");
                    if let Err(rollback) = conn.rollback().await {
                        tracing::error!(error = %rollback, "Rollback failed");
                    }
                    conn.close().await;
                    return Err(fault
                        .with_context(format!("row {} (order {})", index + 1, record.order_number))
                        .into_error("save", None));
                },
            }

            control.report(SaveProgress::new(n + 1, total));
        }

        if let Err(fault) = conn.commit().await {
            tracing::error!(error = %fault, "Commit failed");
            conn.close().await;
            return Err(fault.into_error("save", None));
        }
        conn.close().await;

        tracing::info!(
            saved = report.saved,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Save finished"
        );
        Ok(report)
    }

    /// Apply `changes` to the stored record `id`
    ///
    /// Returns `false` when no row has that id, or when `changes` is empty
    /// (the store is not contacted then).
    #[tracing::instrument(skip(self, changes), fields(table = %self.table))]
    pub async fn update(&self, id: RecordId, changes: &RecordChanges) -> Result<bool> {
        changes.validate()?;
        if changes.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.lock().await;
        let mut conn = self.open("update", &mut state, true).await?;
        let result = conn.update(&self.table, id, changes).await;
        conn.close().await;

        let rows = result.map_err(|fault| {
            tracing::error!(error = %fault, "Update failed");
            fault.into_error("update", Some(id))
        })?;
        if rows == 0 {
            tracing::debug!("No stored record to update");
        }
        Ok(rows > 0)
    }

    /// Remove the stored record `id`; `false` when no row has that id
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    pub async fn delete(&self, id: RecordId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let mut conn = self.open("delete", &mut state, true).await?;
        let result = conn.delete(&self.table, id).await;
        conn.close().await;

        let rows = result.map_err(|fault| {
            tracing::error!(error = %fault, "Delete failed");
            fault.into_error("delete", Some(id))
        })?;
        Ok(rows > 0)
    }

    /// Check the table and its canonical columns exist
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    pub async fn verify_schema(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.schema_verified = false;
        let conn = self.open("verify_schema", &mut state, true).await?;
        conn.close().await;
        Ok(())
    }

    /// Create the record table if it does not exist, then verify it
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    pub async fn create_schema(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut conn = self.open("create_schema", &mut state, false).await?;

        let result = match conn.create_table(&self.table).await {
            Ok(()) => self.check_schema(&mut conn, "create_schema").await,
            Err(fault) => Err(fault.into_error("create_schema", None)),
        };
        conn.close().await;

        result?;
        state.schema_verified = true;
        tracing::info!("Record table ready");
        Ok(())
    }
}

impl<S: RecordStore> std::fmt::Debug for RecordGateway<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordGateway")
            .field("table", &self.table)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// A gateway that can only read
pub struct ReadOnlyGateway<S: RecordStore> {
    inner: RecordGateway<S>,
}

impl ReadOnlyGateway<PgRecordStore> {
    pub fn postgres(config: ProcessConfig) -> Result<Self> {
        Ok(RecordGateway::postgres(config)?.read_only())
    }
}

impl<S: RecordStore> ReadOnlyGateway<S> {
    pub fn table(&self) -> &TableName {
        self.inner.table()
    }

    pub async fn fetch(&self, criteria: &FilterCriteria) -> Result<RecordSet> {
        self.inner.fetch(criteria).await
    }

    pub async fn load_recent(&self, days: u64) -> Result<RecordSet> {
        self.inner.load_recent(days).await
    }

    pub async fn load_all(&self) -> Result<RecordSet> {
        self.inner.load_all().await
    }

    pub async fn verify_schema(&self) -> Result<()> {
        self.inner.verify_schema().await
    }
}

impl<S: RecordStore> std::fmt::Debug for ReadOnlyGateway<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadOnlyGateway").field(&self.inner).finish()
    }
}
