//! `separator update` command implementation
//!
//! Loads the record, applies the change through the reconciler and reports
//! whether the database confirmed it.

use colored::Colorize;
use separator_core::normalize::coerce::parse_date_text;
use separator_core::{FilterCriteria, Reconciler, RecordChanges, RecordEdit, RecordId};

use crate::commands::{gateway, now};
use crate::error::{CliError, Result};
use crate::output;

/// Field flags given to `update`
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub order: Option<String>,
    pub separator: Option<String>,
    pub date: Option<String>,
    pub clear_date: bool,
    pub analysis: Option<bool>,
}

impl UpdateFields {
    /// Translate the flags into a change set
    pub fn changes(&self) -> Result<RecordChanges> {
        let mut changes = RecordChanges::new();
        if let Some(ref order) = self.order {
            changes = changes.order_number(order.clone());
        }
        if let Some(ref separator) = self.separator {
            changes = changes.separator_name(separator.clone());
        }
        if let Some(ref date) = self.date {
            let parsed = parse_date_text(date)
                .ok_or_else(|| CliError::invalid_argument(format!("'{}' is not a date", date)))?;
            changes = changes.date_of_separation(Some(parsed));
        }
        if self.clear_date {
            changes = changes.date_of_separation(None);
        }
        if let Some(analysis) = self.analysis {
            changes = changes.analysis(analysis);
        }

        if changes.is_empty() {
            return Err(CliError::NothingToUpdate);
        }
        changes.validate()?;
        Ok(changes)
    }
}

/// Update one stored record
pub async fn run(id: RecordId, fields: UpdateFields) -> Result<()> {
    let changes = fields.changes()?;
    let gateway = gateway()?;

    let mut set = gateway
        .fetch(&FilterCriteria::new().record_id(id.to_string()))
        .await?;

    let report = Reconciler::new(&gateway)
        .apply_edits(&mut set, &[RecordEdit::stored(id, changes)], now())
        .await?;

    if !report.not_found.is_empty() || !report.store_misses.is_empty() {
        return Err(CliError::NotFound(id));
    }
    if let Some(failure) = report.store_failures.first() {
        return Err(CliError::NotSaved {
            id: failure.id,
            reason: failure.reason.clone(),
        });
    }

    println!("{} Updated record {}", "✓".green(), id);
    if let Some(record) = set.find_by_id(id) {
        println!("{}", output::records_table(std::slice::from_ref(record)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_is_rejected() {
        let err = UpdateFields::default().changes().unwrap_err();
        assert!(matches!(err, CliError::NothingToUpdate));
    }

    #[test]
    fn test_blank_order_is_a_validation_error() {
        let fields = UpdateFields {
            order: Some("  ".to_string()),
            ..UpdateFields::default()
        };
        let err = fields.changes().unwrap_err();
        assert!(err.to_string().contains("Validation error"));
    }

    #[test]
    fn test_unparseable_date_is_rejected() {
        let fields = UpdateFields {
            date: Some("next tuesday".to_string()),
            ..UpdateFields::default()
        };
        assert!(matches!(
            fields.changes().unwrap_err(),
            CliError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_clear_date_is_a_change() {
        let fields = UpdateFields {
            clear_date: true,
            ..UpdateFields::default()
        };
        assert!(!fields.changes().unwrap().is_empty());
    }

    #[test]
    fn test_date_and_analysis() {
        let fields = UpdateFields {
            date: Some("2024-03-10".to_string()),
            analysis: Some(true),
            ..UpdateFields::default()
        };
        assert!(!fields.changes().unwrap().is_empty());
    }
}
