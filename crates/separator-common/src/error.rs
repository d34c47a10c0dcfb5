//! Error types for separator records

use thiserror::Error;

/// Result type alias for separator-record operations
pub type Result<T> = std::result::Result<T, SeparatorError>;

/// Main error type for separator-record operations
///
/// Each variant maps to one failure class a caller can react to differently:
/// configuration problems are fatal for the attempted operation, connection
/// problems may be retried by the caller, query problems point at the
/// statement or the table schema, and validation problems are raised before
/// the store is ever contacted.
#[derive(Error, Debug)]
pub enum SeparatorError {
    /// Required connection parameters or credentials are unavailable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or authentication failure reaching the record store
    #[error("Connection error during {operation}: {message}")]
    Connection {
        operation: &'static str,
        message: String,
    },

    /// Malformed query or schema mismatch
    #[error("Query error during {operation}{}: {message}", describe_record(.record_id))]
    Query {
        operation: &'static str,
        record_id: Option<i64>,
        message: String,
    },

    /// Input rejected before any store interaction
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeparatorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn connection(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Connection {
            operation,
            message: message.into(),
        }
    }

    pub fn query(operation: &'static str, record_id: Option<i64>, message: impl Into<String>) -> Self {
        Self::Query {
            operation,
            record_id,
            message: message.into(),
        }
    }

    /// Short machine-friendly name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            SeparatorError::Configuration(_) => "configuration",
            SeparatorError::Connection { .. } => "connection",
            SeparatorError::Query { .. } => "query",
            SeparatorError::Validation(_) => "validation",
            SeparatorError::Io(_) => "io",
        }
    }

    /// Whether retrying the same call later could succeed without any change
    /// to configuration or input
    pub fn is_transient(&self) -> bool {
        matches!(self, SeparatorError::Connection { .. })
    }
}

fn describe_record(record_id: &Option<i64>) -> String {
    match record_id {
        Some(id) => format!(" (record {})", id),
        None => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_mentions_record() {
        let err = SeparatorError::query("update", Some(42), "column \"analysis\" does not exist");
        assert_eq!(
            err.to_string(),
            "Query error during update (record 42): column \"analysis\" does not exist"
        );

        let err = SeparatorError::query("fetch", None, "syntax error");
        assert_eq!(err.to_string(), "Query error during fetch: syntax error");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SeparatorError::configuration("x").kind(), "configuration");
        assert_eq!(SeparatorError::connection("save", "refused").kind(), "connection");
        assert_eq!(SeparatorError::validation("blank").kind(), "validation");
        assert!(SeparatorError::connection("save", "refused").is_transient());
        assert!(!SeparatorError::configuration("missing").is_transient());
    }
}
