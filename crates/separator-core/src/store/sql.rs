//! Statement builders for the Postgres backend
//!
//! Every filter value and field value is bound as a parameter. The only text
//! interpolated into statements is the table identifier, which
//! [`TableName`] has already validated and quotes here.

use sqlx::{Postgres, QueryBuilder};

use crate::config::TableName;
use crate::filter::FilterCriteria;
use crate::record::{Record, RecordChanges, RecordId};

const RECORD_COLUMNS: &str = "id, order_number, separator_name, date_of_separation, analysis";

/// Escape LIKE metacharacters so user text matches literally
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}

pub fn select_records(table: &TableName, criteria: &FilterCriteria) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM {} WHERE 1=1",
        RECORD_COLUMNS,
        table.quoted()
    ));

    if criteria.from_date.is_some() || criteria.to_date.is_some() {
        qb.push(" AND date_of_separation IS NOT NULL");
    }
    if let Some(lower) = criteria.lower_bound() {
        qb.push(" AND date_of_separation >= ").push_bind(lower);
    }
    if let Some(upper) = criteria.upper_bound_exclusive() {
        qb.push(" AND date_of_separation < ").push_bind(upper);
    }
    if let Some(id) = criteria.record_id_term() {
        qb.push(" AND CAST(id AS TEXT) = ").push_bind(id.to_string());
    }
    if let Some(needle) = criteria.order_number_term() {
        qb.push(" AND order_number ILIKE ")
            .push_bind(contains_pattern(needle))
            .push(" ESCAPE '\\'");
    }
    if let Some(needle) = criteria.separator_name_term() {
        qb.push(" AND separator_name ILIKE ")
            .push_bind(contains_pattern(needle))
            .push(" ESCAPE '\\'");
    }
    if criteria.analysis_only {
        qb.push(" AND analysis = TRUE");
    }

    qb.push(" ORDER BY date_of_separation DESC NULLS LAST, id DESC");
    qb
}

pub fn insert_record(table: &TableName, record: &Record) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} (order_number, separator_name, date_of_separation, analysis) VALUES (",
        table.quoted()
    ));
    {
        let mut values = qb.separated(", ");
        values.push_bind(record.order_number.clone());
        values.push_bind(record.separator_name.clone());
        values.push_bind(record.date_of_separation);
        values.push_bind(record.analysis);
    }
    qb.push(") RETURNING id");
    qb
}

/// `None` when `changes` has nothing to set
pub fn update_record(
    table: &TableName,
    id: RecordId,
    changes: &RecordChanges,
) -> Option<QueryBuilder<'static, Postgres>> {
    if changes.is_empty() {
        return None;
    }

    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", table.quoted()));
    {
        let mut set = qb.separated(", ");
        if let Some(ref order_number) = changes.order_number {
            set.push("order_number = ").push_bind_unseparated(order_number.clone());
        }
        if let Some(ref separator_name) = changes.separator_name {
            set.push("separator_name = ").push_bind_unseparated(separator_name.clone());
        }
        if let Some(date) = changes.date_of_separation {
            set.push("date_of_separation = ").push_bind_unseparated(date);
        }
        if let Some(analysis) = changes.analysis {
            set.push("analysis = ").push_bind_unseparated(analysis);
        }
    }
    qb.push(" WHERE id = ").push_bind(id);
    Some(qb)
}

pub fn delete_record(table: &TableName, id: RecordId) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", table.quoted()));
    qb.push_bind(id);
    qb
}

pub fn table_columns(table: &TableName) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT column_name::text FROM information_schema.columns WHERE table_schema = COALESCE(",
    );
    qb.push_bind(table.schema().map(str::to_string))
        .push("::text, current_schema()) AND table_name = ")
        .push_bind(table.name().to_string())
        .push(" ORDER BY ordinal_position");
    qb
}

/// DDL for the record table, including the uniqueness rule used to detect
/// duplicate rows during a batch save
pub fn create_table(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
            order_number TEXT NOT NULL,
            separator_name TEXT NOT NULL,
            date_of_separation TIMESTAMP,
            analysis BOOLEAN NOT NULL DEFAULT FALSE,
            CONSTRAINT {constraint} UNIQUE (order_number, separator_name, date_of_separation)
        )",
        table = table.quoted(),
        constraint = unique_constraint_name(table),
    )
}

fn unique_constraint_name(table: &TableName) -> String {
    let mut name = format!("{}_record_key", table.name().to_lowercase());
    name.truncate(63);
    format!("\"{}\"", name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table() -> TableName {
        TableName::parse("SeparatorRecords").unwrap()
    }

    #[test]
    fn test_unconstrained_select() {
        let qb = select_records(&table(), &FilterCriteria::new());
        assert_eq!(
            qb.sql(),
            "SELECT id, order_number, separator_name, date_of_separation, analysis \
             FROM \"SeparatorRecords\" WHERE 1=1 \
             ORDER BY date_of_separation DESC NULLS LAST, id DESC"
        );
    }

    #[test]
    fn test_filter_values_are_bound() {
        let criteria = FilterCriteria::new()
            .from_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .to_date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
            .order_number_contains("'; DROP TABLE x; --")
            .separator_name_contains("alice")
            .record_id("7")
            .analysis_only(true);
        let qb = select_records(&table(), &criteria);
        let sql = qb.sql();

        assert!(!sql.contains("DROP"));
        assert!(!sql.contains("alice"));
        assert!(sql.contains("date_of_separation >= $1"));
        assert!(sql.contains("date_of_separation < $2"));
        assert!(sql.contains("CAST(id AS TEXT) = $3"));
        assert!(sql.contains("order_number ILIKE $4 ESCAPE '\\'"));
        assert!(sql.contains("separator_name ILIKE $5"));
        assert!(sql.contains("analysis = TRUE"));
    }

    #[test]
    fn test_blank_terms_add_no_predicates() {
        let criteria = FilterCriteria::new().order_number_contains("  ").record_id("");
        let qb = select_records(&table(), &criteria);
        assert!(!qb.sql().contains("$1"));
    }

    #[test]
    fn test_update_sets_only_present_fields() {
        let changes = RecordChanges::new().separator_name("X").analysis(true);
        let qb = update_record(&table(), 9, &changes).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE \"SeparatorRecords\" SET separator_name = $1, analysis = $2 WHERE id = $3"
        );
        assert!(update_record(&table(), 9, &RecordChanges::new()).is_none());
    }

    #[test]
    fn test_insert_and_delete() {
        let record = Record::new("ORD-1", "Alice", None, false);
        let qb = insert_record(&table(), &record);
        assert_eq!(
            qb.sql(),
            "INSERT INTO \"SeparatorRecords\" (order_number, separator_name, date_of_separation, analysis) \
             VALUES ($1, $2, $3, $4) RETURNING id"
        );
        assert_eq!(
            delete_record(&table(), 4).sql(),
            "DELETE FROM \"SeparatorRecords\" WHERE id = $1"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn test_create_table_declares_uniqueness() {
        let ddl = create_table(&table());
        assert!(ddl.contains("UNIQUE (order_number, separator_name, date_of_separation)"));
        assert!(ddl.contains("\"separatorrecords_record_key\""));
    }
}
