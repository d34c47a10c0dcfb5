//! Schema normalizer
//!
//! Maps loosely named source columns onto the five canonical record fields
//! and coerces every cell into its canonical type. Normalization is total:
//! missing columns and unrecognisable values produce defaults, never errors.

pub mod coerce;

use chrono::{Local, NaiveDateTime};

use crate::record::{Record, RecordSet};
use crate::table::RawTable;

pub use coerce::{coerce_bool, coerce_date, coerce_id, coerce_text, parse_bool_token, parse_date_text};

/// The five fields every record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalColumn {
    Id,
    OrderNumber,
    SeparatorName,
    DateOfSeparation,
    Analysis,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 5] = [
        CanonicalColumn::Id,
        CanonicalColumn::OrderNumber,
        CanonicalColumn::SeparatorName,
        CanonicalColumn::DateOfSeparation,
        CanonicalColumn::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Id => "id",
            CanonicalColumn::OrderNumber => "order_number",
            CanonicalColumn::SeparatorName => "separator_name",
            CanonicalColumn::DateOfSeparation => "date_of_separation",
            CanonicalColumn::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical column for a source header, matched case-insensitively
///
/// Headers outside the alias table return `None` and are dropped.
pub fn canonical_column(header: &str) -> Option<CanonicalColumn> {
    let key = header.trim().to_lowercase();
    let column = match key.as_str() {
        "id" | "record_id" | "recordid" => CanonicalColumn::Id,
        "ordernumber" | "order" | "order number" | "order_number" => CanonicalColumn::OrderNumber,
        "separatorname" | "separator" | "separator name" | "separator_name" => {
            CanonicalColumn::SeparatorName
        },
        "dateofseparation" | "date" | "date of separation" | "separation date"
        | "separation_date" | "date_of_separation" => CanonicalColumn::DateOfSeparation,
        // "analisys" is a common misspelling in exported sheets
        "analysis" | "analisys" => CanonicalColumn::Analysis,
        _ => return None,
    };
    Some(column)
}

/// Resolved positions of canonical columns within a raw table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    id: Option<usize>,
    order_number: Option<usize>,
    separator_name: Option<usize>,
    date_of_separation: Option<usize>,
    analysis: Option<usize>,
}

impl ColumnMap {
    /// Resolve headers; when several map to the same field the first wins
    pub fn resolve(headers: &[String]) -> Self {
        let mut map = Self::default();
        for (index, header) in headers.iter().enumerate() {
            let Some(column) = canonical_column(header) else {
                tracing::trace!(header = %header, "Dropping unrecognised column");
                continue;
            };
            let slot = map.slot_mut(column);
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        map
    }

    pub fn position(&self, column: CanonicalColumn) -> Option<usize> {
        match column {
            CanonicalColumn::Id => self.id,
            CanonicalColumn::OrderNumber => self.order_number,
            CanonicalColumn::SeparatorName => self.separator_name,
            CanonicalColumn::DateOfSeparation => self.date_of_separation,
            CanonicalColumn::Analysis => self.analysis,
        }
    }

    /// Canonical columns with no source column
    pub fn missing(&self) -> Vec<CanonicalColumn> {
        CanonicalColumn::ALL
            .into_iter()
            .filter(|c| self.position(*c).is_none())
            .collect()
    }

    fn slot_mut(&mut self, column: CanonicalColumn) -> &mut Option<usize> {
        match column {
            CanonicalColumn::Id => &mut self.id,
            CanonicalColumn::OrderNumber => &mut self.order_number,
            CanonicalColumn::SeparatorName => &mut self.separator_name,
            CanonicalColumn::DateOfSeparation => &mut self.date_of_separation,
            CanonicalColumn::Analysis => &mut self.analysis,
        }
    }
}

/// Normalize a raw table using the current local time for the default view
pub fn normalize(table: &RawTable) -> RecordSet {
    normalize_at(table, Local::now().naive_local())
}

/// Normalize a raw table, choosing the default view relative to `now`
pub fn normalize_at(table: &RawTable, now: NaiveDateTime) -> RecordSet {
    let records = normalize_records(table);
    RecordSet::with_default_view(records, now)
}

/// Canonical records for every row, in source order
pub fn normalize_records(table: &RawTable) -> Vec<Record> {
    let map = ColumnMap::resolve(table.columns());
    let missing = map.missing();
    if !missing.is_empty() {
        tracing::debug!(
            missing = ?missing.iter().map(CanonicalColumn::as_str).collect::<Vec<_>>(),
            "Filling missing columns with defaults"
        );
    }

    (0..table.len())
        .map(|row| {
            let cell = |column: CanonicalColumn| {
                map.position(column).map(|index| table.cell(row, index))
            };
            Record {
                id: cell(CanonicalColumn::Id).and_then(coerce_id),
                order_number: cell(CanonicalColumn::OrderNumber)
                    .map(coerce_text)
                    .unwrap_or_default(),
                separator_name: cell(CanonicalColumn::SeparatorName)
                    .map(coerce_text)
                    .unwrap_or_default(),
                date_of_separation: cell(CanonicalColumn::DateOfSeparation).and_then(coerce_date),
                analysis: cell(CanonicalColumn::Analysis).map(coerce_bool).unwrap_or(false),
            }
        })
        .collect()
}
