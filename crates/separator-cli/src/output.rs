//! Rendering records for the terminal

use chrono::Timelike;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use separator_core::{Record, RecordSet};

use crate::error::Result;

const HEADERS: [&str; 5] = ["ID", "Order", "Separator", "Date of separation", "Analysis"];

/// Text shown for a date that is unknown
const NO_DATE: &str = "-";

/// Format a separation date, dropping a midnight time of day
pub fn format_date(record: &Record) -> String {
    match record.date_of_separation {
        Some(value) if value.num_seconds_from_midnight() == 0 => value.format("%Y-%m-%d").to_string(),
        Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => NO_DATE.to_string(),
    }
}

/// Build a table with one row per record
pub fn records_table(records: &[Record]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(HEADERS);

    for record in records {
        table.add_row(vec![
            record.id.map(|id| id.to_string()).unwrap_or_else(|| "new".to_string()),
            record.order_number.clone(),
            record.separator_name.clone(),
            format_date(record),
            if record.analysis { "yes" } else { "no" }.to_string(),
        ]);
    }
    table
}

/// Print the visible part of `set`, as a table or as JSON
pub fn print_set(set: &RecordSet, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(set.filtered())?);
        return Ok(());
    }

    if set.filtered().is_empty() {
        println!("No records to show.");
    } else {
        println!("{}", records_table(set.filtered()));
    }
    println!(
        "{}",
        format!("Showing {} of {} record(s)", set.filtered().len(), set.len()).dimmed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dated(h: u32) -> Record {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10)
            .and_then(|d| d.and_hms_opt(h, 30, 0))
            .unwrap();
        Record::new("ORD-1", "Ana", Some(date), true)
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&dated(14)), "2024-03-10 14:30:00");

        let midnight = NaiveDate::from_ymd_opt(2024, 3, 10)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let record = Record::new("ORD-2", "Ana", Some(midnight), false);
        assert_eq!(format_date(&record), "2024-03-10");

        assert_eq!(format_date(&Record::new("ORD-3", "Ana", None, false)), "-");
    }

    #[test]
    fn test_records_table_marks_new_records() {
        let records = vec![dated(9).with_id(7), dated(10)];
        let rendered = records_table(&records).to_string();
        assert!(rendered.contains("ORD-1"));
        assert!(rendered.contains("7"));
        assert!(rendered.contains("new"));
        assert!(rendered.contains("yes"));
    }
}
