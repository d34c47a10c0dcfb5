//! Filter engine
//!
//! Predicates over canonical records. Every criterion is optional and the
//! present ones are combined with AND; an absent criterion never constrains
//! the result. Filtering never reorders or invents records.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Data sets smaller than this are shown in full on first load
pub const SMALL_DATASET_THRESHOLD: usize = 100;

/// Width of the default trailing date window, in days
pub const DEFAULT_WINDOW_DAYS: u64 = 7;

/// Optional filter predicates, combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Inclusive lower bound, compared from the start of the day
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper bound covering the whole day
    pub to_date: Option<NaiveDate>,
    /// Exact match against the textual form of the record id
    pub record_id: Option<String>,
    /// Case-insensitive substring of the order number
    pub order_number_contains: Option<String>,
    /// Case-insensitive substring of the separator name
    pub separator_name_contains: Option<String>,
    /// Only records flagged for analysis
    #[serde(default)]
    pub analysis_only: bool,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn to_date(mut self, date: NaiveDate) -> Self {
        self.to_date = Some(date);
        self
    }

    pub fn record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }

    pub fn order_number_contains(mut self, needle: impl Into<String>) -> Self {
        self.order_number_contains = Some(needle.into());
        self
    }

    pub fn separator_name_contains(mut self, needle: impl Into<String>) -> Self {
        self.separator_name_contains = Some(needle.into());
        self
    }

    pub fn analysis_only(mut self, only: bool) -> Self {
        self.analysis_only = only;
        self
    }

    /// Trailing window of `days` ending today
    pub fn trailing_days(today: NaiveDate, days: u64) -> Self {
        let from = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        Self::new().from_date(from).to_date(today)
    }

    /// Lower date-time bound (inclusive)
    pub fn lower_bound(&self) -> Option<NaiveDateTime> {
        self.from_date.and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Upper date-time bound (exclusive): midnight after `to_date`
    ///
    /// `None` for `to_date == NaiveDate::MAX`, where no later instant exists.
    pub fn upper_bound_exclusive(&self) -> Option<NaiveDateTime> {
        self.to_date
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// The record-id criterion, if it is non-blank
    pub fn record_id_term(&self) -> Option<&str> {
        non_blank(&self.record_id)
    }

    pub fn order_number_term(&self) -> Option<&str> {
        non_blank(&self.order_number_contains)
    }

    pub fn separator_name_term(&self) -> Option<&str> {
        non_blank(&self.separator_name_contains)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.from_date.is_none()
            && self.to_date.is_none()
            && self.record_id_term().is_none()
            && self.order_number_term().is_none()
            && self.separator_name_term().is_none()
            && !self.analysis_only
    }

    /// Whether a single record satisfies every present criterion
    pub fn matches(&self, record: &Record) -> bool {
        if self.from_date.is_some() || self.to_date.is_some() {
            // Unknown dates cannot be shown to fall inside a date range
            let Some(date) = record.date_of_separation else {
                return false;
            };
            if matches!(self.lower_bound(), Some(lower) if date < lower) {
                return false;
            }
            if matches!(self.upper_bound_exclusive(), Some(upper) if date >= upper) {
                return false;
            }
        }

        if let Some(id) = self.record_id_term() {
            match record.id {
                Some(record_id) if record_id.to_string() == id => {},
                _ => return false,
            }
        }

        if let Some(needle) = self.order_number_term() {
            if !contains_ignore_case(&record.order_number, needle) {
                return false;
            }
        }

        if let Some(needle) = self.separator_name_term() {
            if !contains_ignore_case(&record.separator_name, needle) {
                return false;
            }
        }

        !self.analysis_only || record.analysis
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Records of `records` matching `criteria`, in input order
pub fn apply_filters(records: &[Record], criteria: &FilterCriteria) -> Vec<Record> {
    if criteria.is_unconstrained() {
        return records.to_vec();
    }
    records.iter().filter(|r| criteria.matches(r)).cloned().collect()
}

/// Records dated within `days` before `now`, both ends inclusive
///
/// A window reaching past the earliest representable date starts there.
pub fn trailing_window(records: &[Record], now: NaiveDateTime, days: u64) -> Vec<Record> {
    let start = now.checked_sub_days(Days::new(days)).unwrap_or(NaiveDateTime::MIN);
    records
        .iter()
        .filter(|r| matches!(r.date_of_separation, Some(d) if d >= start && d <= now))
        .cloned()
        .collect()
}

/// The view shown right after data is loaded
///
/// Small data sets are shown in full. Larger ones are narrowed to the
/// trailing week, unless that week is empty, in which case everything is
/// shown again so a non-empty data set never produces an empty view.
pub fn default_view(records: &[Record], now: NaiveDateTime) -> Vec<Record> {
    if records.len() < SMALL_DATASET_THRESHOLD {
        return records.to_vec();
    }

    let recent = trailing_window(records, now, DEFAULT_WINDOW_DAYS);
    if recent.is_empty() {
        tracing::debug!(
            total = records.len(),
            "No records in the default window, showing the full data set"
        );
        return records.to_vec();
    }
    recent
}
