//! Canonical separator records and the in-memory record set
//!
//! A [`Record`] always carries all five canonical fields; values that were
//! missing in the source are normalized (empty string, `None` date, `false`)
//! rather than left out. A [`RecordSet`] keeps the full `original` collection
//! next to the `filtered` view that is shown to the user.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::filter::{self, FilterCriteria};

/// Store-assigned record identifier
pub type RecordId = i64;

/// One separator record in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Present only for records that exist in the store
    pub id: Option<RecordId>,
    pub order_number: String,
    pub separator_name: String,
    /// `None` means the date is unknown, never "today" or the epoch
    pub date_of_separation: Option<NaiveDateTime>,
    pub analysis: bool,
}

impl Record {
    /// Create a local-only record
    pub fn new(
        order_number: impl Into<String>,
        separator_name: impl Into<String>,
        date_of_separation: Option<NaiveDateTime>,
        analysis: bool,
    ) -> Self {
        Self {
            id: None,
            order_number: order_number.into(),
            separator_name: separator_name.into(),
            date_of_separation,
            analysis,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// A record without a store id has not been persisted yet
    pub fn is_local_only(&self) -> bool {
        self.id.is_none()
    }

    /// Names of required text fields that are blank
    pub fn blank_required_fields(&self) -> Vec<&'static str> {
        let mut blank = Vec::new();
        if self.order_number.trim().is_empty() {
            blank.push("order_number");
        }
        if self.separator_name.trim().is_empty() {
            blank.push("separator_name");
        }
        blank
    }

    /// Apply only the fields present in `changes`; returns whether anything changed
    pub fn apply(&mut self, changes: &RecordChanges) -> bool {
        let before = self.clone();

        if let Some(ref order_number) = changes.order_number {
            self.order_number = order_number.clone();
        }
        if let Some(ref separator_name) = changes.separator_name {
            self.separator_name = separator_name.clone();
        }
        if let Some(date) = changes.date_of_separation {
            self.date_of_separation = date;
        }
        if let Some(analysis) = changes.analysis {
            self.analysis = analysis;
        }

        *self != before
    }
}

/// A partial set of field changes
///
/// Only fields that are `Some` are applied. `date_of_separation` is doubly
/// optional so that a change can explicitly clear the date
/// (`Some(None)`) as opposed to leaving it untouched (`None`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_separation: Option<Option<NaiveDateTime>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<bool>,
}

impl RecordChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_number(mut self, value: impl Into<String>) -> Self {
        self.order_number = Some(value.into());
        self
    }

    pub fn separator_name(mut self, value: impl Into<String>) -> Self {
        self.separator_name = Some(value.into());
        self
    }

    pub fn date_of_separation(mut self, value: Option<NaiveDateTime>) -> Self {
        self.date_of_separation = Some(value);
        self
    }

    pub fn analysis(mut self, value: bool) -> Self {
        self.analysis = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_number.is_none()
            && self.separator_name.is_none()
            && self.date_of_separation.is_none()
            && self.analysis.is_none()
    }

    /// Rejects changes that would blank a required field
    pub fn validate(&self) -> separator_common::Result<()> {
        for (field, value) in [
            ("order_number", &self.order_number),
            ("separator_name", &self.separator_name),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(separator_common::SeparatorError::validation(format!(
                    "{} cannot be blank",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// The full set of loaded records plus the view derived from it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordSet {
    original: Vec<Record>,
    filtered: Vec<Record>,
    #[serde(skip)]
    active_criteria: Option<FilterCriteria>,
}

impl RecordSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set whose view is chosen by the default-filter policy
    pub fn with_default_view(records: Vec<Record>, now: NaiveDateTime) -> Self {
        let filtered = filter::default_view(&records, now);
        Self {
            original: records,
            filtered,
            active_criteria: None,
        }
    }

    /// Build a set whose view shows every record, before and after edits
    pub fn unfiltered(records: Vec<Record>) -> Self {
        Self {
            filtered: records.clone(),
            original: records,
            active_criteria: Some(FilterCriteria::new()),
        }
    }

    pub fn original(&self) -> &[Record] {
        &self.original
    }

    pub fn filtered(&self) -> &[Record] {
        &self.filtered
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Criteria the view is derived from; `None` means the default view
    pub fn active_criteria(&self) -> Option<&FilterCriteria> {
        self.active_criteria.as_ref()
    }

    /// Replace the view with the records matching `criteria`
    pub fn apply_filters(&mut self, criteria: FilterCriteria) {
        self.filtered = filter::apply_filters(&self.original, &criteria);
        self.active_criteria = Some(criteria);
    }

    /// Forget explicit criteria and fall back to the default view
    pub fn reset_filters(&mut self, now: NaiveDateTime) {
        self.active_criteria = None;
        self.filtered = filter::default_view(&self.original, now);
    }

    /// Replace the whole set with freshly loaded records
    pub fn replace(&mut self, records: Vec<Record>, now: NaiveDateTime) {
        *self = Self::with_default_view(records, now);
    }

    /// Recompute the view after `original` changed
    pub fn refresh_view(&mut self, now: NaiveDateTime) {
        match self.active_criteria {
            Some(ref criteria) => self.filtered = filter::apply_filters(&self.original, criteria),
            None => self.filtered = filter::default_view(&self.original, now),
        }
    }

    pub fn find_by_id(&self, id: RecordId) -> Option<&Record> {
        self.original.iter().find(|r| r.id == Some(id))
    }

    pub(crate) fn position_of(&self, id: RecordId) -> Option<usize> {
        self.original.iter().position(|r| r.id == Some(id))
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.original.get_mut(index)
    }

    /// Mark the record at `index` as persisted under `id`
    pub(crate) fn assign_id(&mut self, index: usize, id: RecordId) -> bool {
        match self.original.get_mut(index) {
            Some(record) if record.id.is_none() => {
                record.id = Some(id);
                true
            },
            _ => false,
        }
    }

    pub(crate) fn remove_by_id(&mut self, id: RecordId) -> Option<Record> {
        let index = self.position_of(id)?;
        Some(self.original.remove(index))
    }

    /// Drop a local-only record by its position in `original`
    pub fn discard_local(&mut self, index: usize, now: NaiveDateTime) -> Option<Record> {
        if !self.original.get(index)?.is_local_only() {
            return None;
        }
        let removed = self.original.remove(index);
        self.refresh_view(now);
        Some(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut record = Record::new("ORD-1", "Alice", Some(at(2024, 3, 1)), false).with_id(7);
        let changed = record.apply(&RecordChanges::new().separator_name("X"));

        assert!(changed);
        assert_eq!(record.separator_name, "X");
        assert_eq!(record.order_number, "ORD-1");
        assert_eq!(record.date_of_separation, Some(at(2024, 3, 1)));
        assert!(!record.analysis);
    }

    #[test]
    fn test_apply_can_clear_date() {
        let mut record = Record::new("ORD-1", "Alice", Some(at(2024, 3, 1)), false);
        assert!(record.apply(&RecordChanges::new().date_of_separation(None)));
        assert_eq!(record.date_of_separation, None);
        assert!(!record.apply(&RecordChanges::new().date_of_separation(None)));
    }

    #[test]
    fn test_changes_validation() {
        assert!(RecordChanges::new().analysis(true).validate().is_ok());
        assert!(RecordChanges::new().order_number("  ").validate().is_err());
        assert!(RecordChanges::new().is_empty());
    }

    #[test]
    fn test_blank_required_fields() {
        let record = Record::new("", " ", None, false);
        assert_eq!(record.blank_required_fields(), vec!["order_number", "separator_name"]);
    }

    #[test]
    fn test_refresh_view_reapplies_active_criteria() {
        let now = at(2024, 3, 10);
        let mut set = RecordSet::unfiltered(vec![
            Record::new("A-1", "Alice", Some(at(2024, 3, 1)), true).with_id(1),
            Record::new("B-2", "Bob", Some(at(2024, 3, 2)), false).with_id(2),
        ]);
        set.apply_filters(FilterCriteria::new().analysis_only(true));
        assert_eq!(set.filtered().len(), 1);

        let index = set.position_of(2).unwrap();
        set.get_mut(index).unwrap().analysis = true;
        set.refresh_view(now);
        assert_eq!(set.filtered().len(), 2);
    }

    #[test]
    fn test_view_policy_survives_refresh() {
        let now = at(2024, 3, 10);
        let mut records: Vec<Record> = (0..120)
            .map(|i| Record::new(format!("OLD-{i}"), "Alice", Some(at(2024, 1, 2)), false).with_id(i))
            .collect();
        records.push(Record::new("NEW-1", "Bob", Some(at(2024, 3, 9)), false).with_id(500));

        let mut all = RecordSet::unfiltered(records.clone());
        all.refresh_view(now);
        assert_eq!(all.filtered().len(), 121);

        let mut default = RecordSet::with_default_view(records, now);
        assert_eq!(default.filtered().len(), 1);
        default.refresh_view(now);
        assert_eq!(default.filtered().len(), 1);
    }

    #[test]
    fn test_reset_filters_returns_to_default_view() {
        let now = at(2024, 3, 10);
        let mut set = RecordSet::unfiltered(vec![
            Record::new("A-1", "Alice", Some(at(2024, 3, 1)), true).with_id(1),
            Record::new("B-2", "Bob", Some(at(2024, 3, 2)), false).with_id(2),
        ]);
        set.apply_filters(FilterCriteria::new().analysis_only(true));
        assert_eq!(set.filtered().len(), 1);

        set.reset_filters(now);
        assert!(set.active_criteria().is_none());
        assert_eq!(set.filtered().len(), 2);
    }

    #[test]
    fn test_discard_local_only_removes_unsaved_records() {
        let now = at(2024, 3, 10);
        let mut set = RecordSet::unfiltered(vec![
            Record::new("A-1", "Alice", None, false).with_id(1),
            Record::new("B-2", "Bob", None, false),
        ]);
        assert!(set.discard_local(0, now).is_none());
        assert_eq!(set.discard_local(1, now).unwrap().order_number, "B-2");
        assert_eq!(set.len(), 1);
    }
}
