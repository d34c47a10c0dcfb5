//! Cell coercions into canonical field types
//!
//! All functions here are total: unrecognised input maps to the documented
//! fallback instead of an error.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::record::RecordId;
use crate::table::CellValue;

const TRUE_TOKENS: [&str; 5] = ["yes", "true", "t", "y", "1"];
const FALSE_TOKENS: [&str; 5] = ["no", "false", "f", "n", "0"];

/// Date-time layouts tried in order before the date-only layouts
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

/// Month-first wins for slash dates; day-first is the fallback when the
/// month would be out of range.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Day zero of spreadsheet serial dates
fn spreadsheet_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Largest serial a spreadsheet can hold (9999-12-31)
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;

/// Interpret a cell as a boolean flag
///
/// Native booleans pass through, numbers are true when non-zero, and text is
/// matched case-insensitively against the yes/no token lists. Anything else
/// is `false`.
pub fn coerce_bool(cell: &CellValue) -> bool {
    match cell {
        CellValue::Bool(b) => *b,
        CellValue::Int(i) => *i != 0,
        CellValue::Float(f) => !f.is_nan() && *f != 0.0,
        CellValue::Text(s) => parse_bool_token(s).unwrap_or(false),
        CellValue::Empty | CellValue::DateTime(_) => false,
    }
}

/// Recognised yes/no token, if any
pub fn parse_bool_token(value: &str) -> Option<bool> {
    let token = value.trim().to_lowercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Best-effort date parsing; `None` when the value is not a date
pub fn coerce_date(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Int(i) => from_spreadsheet_serial(*i as f64),
        CellValue::Float(f) => from_spreadsheet_serial(*f),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// Parse a textual date or date-time in any of the accepted layouts
pub fn parse_date_text(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(dt);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert a spreadsheet serial day number, keeping the fractional day as time
pub fn from_spreadsheet_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SPREADSHEET_SERIAL {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    spreadsheet_epoch()?.checked_add_signed(Duration::seconds(seconds))
}

/// Render a cell as text for string fields; blanks become ""
pub fn coerce_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) if f.is_nan() => String::new(),
        // Whole numbers read back from spreadsheets as floats ("1234.0")
        CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        CellValue::Float(f) => f.to_string(),
        CellValue::DateTime(dt) => dt.to_string(),
    }
}

/// Store id carried by a cell, if it holds a whole number
pub fn coerce_id(cell: &CellValue) -> Option<RecordId> {
    match cell {
        CellValue::Int(i) => Some(*i),
        CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
