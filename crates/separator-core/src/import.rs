//! File import and validation
//!
//! Reads separator sheets (CSV or spreadsheet workbooks) from disk into a
//! [`RawTable`], checks that the required columns are usable, and hands the
//! table to the normalizer.

use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use separator_common::{Result, SeparatorError};

use crate::normalize::{self, CanonicalColumn, ColumnMap};
use crate::record::RecordSet;
use crate::table::{CellValue, RawTable};

/// Columns that must be present and non-blank in every imported row
pub const REQUIRED_IMPORT_COLUMNS: [CanonicalColumn; 2] =
    [CanonicalColumn::OrderNumber, CanonicalColumn::SeparatorName];

/// Read a tabular file, choosing the reader by extension
pub fn read_file(path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => {
            let file = std::fs::File::open(path)?;
            read_csv(file)
        },
        Some("xlsx" | "xlsm" | "xls") => read_workbook(path),
        _ => Err(SeparatorError::validation(format!(
            "Unsupported file format for {}. Supported formats: .csv, .xlsx, .xlsm, .xls",
            path.display()
        ))),
    }
}

/// Read the first worksheet of a workbook; its first row holds the headers
///
/// The format is detected from the file contents, not the extension.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path)?;
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| workbook_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            SeparatorError::validation(format!("{} contains no worksheets", path.display()))
        })?
        .map_err(|e| workbook_error(path, e))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string().trim().to_string()).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut table = RawTable::new(headers);
    for cells in rows {
        table.push_row(cells.iter().map(workbook_cell));
    }

    tracing::debug!(columns = table.columns().len(), rows = table.len(), "Read worksheet");
    Ok(table)
}

fn workbook_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        // Date-formatted numbers outside chrono's range stay serials
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Float(dt.as_f64())),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

fn workbook_error(path: &Path, err: impl std::fmt::Display) -> SeparatorError {
    SeparatorError::validation(format!("Failed to read workbook {}: {}", path.display(), err))
}

/// Parse CSV with a header row; every cell is kept as text
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| SeparatorError::validation(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut table = RawTable::new(headers);
    for (index, row) in csv_reader.records().enumerate() {
        let row = row.map_err(|e| {
            SeparatorError::validation(format!("Malformed CSV at data row {}: {}", index + 1, e))
        })?;
        table.push_row(row.iter().map(CellValue::text));
    }

    tracing::debug!(columns = table.columns().len(), rows = table.len(), "Read CSV table");
    Ok(table)
}

/// Reject tables that cannot produce usable records
///
/// Row numbers in messages are 1-based data rows (the header is not counted).
pub fn validate_table(table: &RawTable) -> Result<()> {
    if table.is_empty() {
        return Err(SeparatorError::validation("The file contains no data rows"));
    }

    let map = ColumnMap::resolve(table.columns());
    let mut missing = Vec::new();
    for column in REQUIRED_IMPORT_COLUMNS {
        if map.position(column).is_none() {
            missing.push(column.as_str());
        }
    }
    if !missing.is_empty() {
        return Err(SeparatorError::validation(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    for column in REQUIRED_IMPORT_COLUMNS {
        let Some(index) = map.position(column) else {
            continue;
        };
        if let Some(row) = (0..table.len()).find(|row| table.cell(*row, index).is_blank()) {
            return Err(SeparatorError::validation(format!(
                "Column {} is blank in row {}",
                column,
                row + 1
            )));
        }
    }

    Ok(())
}

/// Read, validate and normalize a file in one step
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn import_file(path: impl AsRef<Path>) -> Result<RecordSet> {
    let table = read_file(path.as_ref())?;
    validate_table(&table)?;
    let set = normalize::normalize(&table);
    tracing::info!(records = set.len(), shown = set.filtered().len(), "Imported file");
    Ok(set)
}
