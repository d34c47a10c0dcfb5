//! Reconciliation of in-memory edits with the store
//!
//! Edits are applied to the loaded [`RecordSet`] first and then pushed to
//! the store one record at a time. The in-memory and store outcomes are
//! counted separately and may differ; the report says where.

use chrono::NaiveDateTime;
use serde::Serialize;

use separator_common::{Result, SeparatorError};

use crate::gateway::{RecordGateway, SaveControl, SaveReport};
use crate::record::{RecordChanges, RecordId, RecordSet};
use crate::store::RecordStore;

/// Which record an edit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditTarget {
    /// A record with a store id
    Stored(RecordId),
    /// A record by its position in the set, for records without an id
    Local(usize),
}

impl std::fmt::Display for EditTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditTarget::Stored(id) => write!(f, "record {}", id),
            EditTarget::Local(index) => write!(f, "unsaved row {}", index + 1),
        }
    }
}

/// Field-level changes for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEdit {
    pub target: EditTarget,
    pub changes: RecordChanges,
}

impl RecordEdit {
    pub fn stored(id: RecordId, changes: RecordChanges) -> Self {
        Self {
            target: EditTarget::Stored(id),
            changes,
        }
    }

    pub fn local(index: usize, changes: RecordChanges) -> Self {
        Self {
            target: EditTarget::Local(index),
            changes,
        }
    }
}

/// A store update that did not go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreFailure {
    pub id: RecordId,
    /// Error class, as reported by [`SeparatorError::kind`]
    pub kind: &'static str,
    pub reason: String,
}

/// Outcome of a batch of edits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub requested: usize,
    /// Records changed in the loaded set
    pub updated_in_memory: usize,
    /// Records the store confirmed as updated
    pub confirmed_in_store: usize,
    /// Edited records that have no store id
    pub local_only: usize,
    /// Targets not present in the loaded set
    pub not_found: Vec<EditTarget>,
    /// Stored records the store no longer has
    pub store_misses: Vec<RecordId>,
    pub store_failures: Vec<StoreFailure>,
}

impl ReconcileReport {
    /// Whether some record changed in memory without the store confirming it
    pub fn diverged(&self) -> bool {
        !self.store_misses.is_empty() || !self.store_failures.is_empty()
    }

    /// Records that were pushed to the store, confirmed or not
    pub fn attempted_in_store(&self) -> usize {
        self.confirmed_in_store + self.store_misses.len() + self.store_failures.len()
    }
}

/// Applies edits to a record set and the store behind it
pub struct Reconciler<'g, S: RecordStore> {
    gateway: &'g RecordGateway<S>,
}

impl<'g, S: RecordStore> Reconciler<'g, S> {
    pub fn new(gateway: &'g RecordGateway<S>) -> Self {
        Self { gateway }
    }

    /// Apply `edits` locally, then push stored records to the store
    ///
    /// Every edit is validated before anything changes. Store failures do
    /// not undo the in-memory change and are not retried; they are listed
    /// in the report. A configuration failure stops the remaining store
    /// updates, since none of them could succeed.
    #[tracing::instrument(skip_all, fields(edits = edits.len()))]
    pub async fn apply_edits(
        &self,
        set: &mut RecordSet,
        edits: &[RecordEdit],
        now: NaiveDateTime,
    ) -> Result<ReconcileReport> {
        for edit in edits {
            edit.changes.validate().map_err(|e| {
                SeparatorError::validation(format!("{}: {}", edit.target, describe(&e)))
            })?;
        }

        let mut report = ReconcileReport {
            requested: edits.len(),
            ..ReconcileReport::default()
        };
        let mut pushes: Vec<(RecordId, &RecordChanges)> = Vec::new();

        for edit in edits.iter().filter(|e| !e.changes.is_empty()) {
            let index = match edit.target {
                EditTarget::Stored(id) => set.position_of(id),
                EditTarget::Local(index) => (index < set.len()).then_some(index),
            };
            let Some(record) = index.and_then(|i| set.get_mut(i)) else {
                report.not_found.push(edit.target);
                continue;
            };

            record.apply(&edit.changes);
            report.updated_in_memory += 1;
            match record.id {
                Some(id) => pushes.push((id, &edit.changes)),
                None => report.local_only += 1,
            }
        }

        let mut pushes = pushes.into_iter();
        while let Some((id, changes)) = pushes.next() {
            match self.gateway.update(id, changes).await {
                Ok(true) => report.confirmed_in_store += 1,
                Ok(false) => {
                    tracing::warn!(id, "Record changed locally but no longer exists in the store");
                    report.store_misses.push(id);
                },
                Err(e) => {
                    tracing::warn!(id, error = %e, "Record changed locally but the store update failed");
                    let stop = matches!(e, SeparatorError::Configuration(_));
                    report.store_failures.push(StoreFailure {
                        id,
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                    if stop {
                        for (id, _) in pushes.by_ref() {
                            report.store_failures.push(StoreFailure {
                                id,
                                kind: e.kind(),
                                reason: e.to_string(),
                            });
                        }
                    }
                },
            }
        }

        set.refresh_view(now);

        if report.diverged() {
            tracing::warn!(
                updated_in_memory = report.updated_in_memory,
                confirmed_in_store = report.confirmed_in_store,
                misses = report.store_misses.len(),
                failures = report.store_failures.len(),
                "In-memory records and store diverged"
            );
        } else {
            tracing::info!(
                updated_in_memory = report.updated_in_memory,
                confirmed_in_store = report.confirmed_in_store,
                "Edits reconciled"
            );
        }
        Ok(report)
    }

    /// Save the set's local-only records and record the ids they received
    #[tracing::instrument(skip_all)]
    pub async fn persist_new(
        &self,
        set: &mut RecordSet,
        control: SaveControl,
        now: NaiveDateTime,
    ) -> Result<SaveReport> {
        let report = self.gateway.save(set.original(), control).await?;
        for &(index, id) in &report.assigned_ids {
            if !set.assign_id(index, id) {
                tracing::warn!(index, id, "Saved record is no longer local-only in the set");
            }
        }
        set.refresh_view(now);
        Ok(report)
    }

    /// Delete a stored record from the store and the set
    ///
    /// Returns the store's answer; the local copy is dropped either way
    /// since the store no longer holds that id.
    #[tracing::instrument(skip(self, set, now))]
    pub async fn delete(&self, set: &mut RecordSet, id: RecordId, now: NaiveDateTime) -> Result<bool> {
        let deleted = self.gateway.delete(id).await?;
        if set.remove_by_id(id).is_some() {
            set.refresh_view(now);
        }
        Ok(deleted)
    }
}

fn describe(err: &SeparatorError) -> String {
    match err {
        SeparatorError::Validation(message) => message.clone(),
        other => other.to_string(),
    }
}
