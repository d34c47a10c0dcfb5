//! Error types for the separator CLI
//!
//! Messages are shown to the user as-is, so each one says what to do next.

use separator_common::SeparatorError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("{0}. Set DB_CONNECTION_STRING (or DB_SERVER and DB_NAME) in the environment or a .env file.")]
    Config(SeparatorError),

    /// The database could not be reached
    #[error("{0}. Check that the database is running and reachable, then retry.")]
    Unreachable(SeparatorError),

    /// Any other failure from the record layer
    #[error(transparent)]
    Records(SeparatorError),

    /// A command-line value could not be understood
    #[error("Invalid argument: {0}. Run 'separator --help' for usage.")]
    InvalidArgument(String),

    /// `update` was called without any field to change
    #[error("No changes given. Pass at least one of --order, --separator, --date, --clear-date or --analysis.")]
    NothingToUpdate,

    /// The record id does not exist in the table
    #[error("Record {0} not found. Run 'separator fetch --id {0}' to check that it still exists.")]
    NotFound(i64),

    /// The database did not accept a change
    #[error("Record {id} was not saved: {reason}. Retry the update once the database is reachable.")]
    NotSaved { id: i64, reason: String },

    /// JSON rendering failed
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SeparatorError> for CliError {
    fn from(err: SeparatorError) -> Self {
        match err {
            SeparatorError::Configuration(_) => Self::Config(err),
            SeparatorError::Connection { .. } => Self::Unreachable(err),
            other => Self::Records(other),
        }
    }
}

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_get_a_hint() {
        let err: CliError = SeparatorError::configuration("no credentials").into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("DB_CONNECTION_STRING"));
    }

    #[test]
    fn test_connection_errors_suggest_retry() {
        let err: CliError = SeparatorError::connection("fetch", "timed out").into();
        assert!(matches!(err, CliError::Unreachable(_)));
        assert!(err.to_string().contains("retry"));
    }

    #[test]
    fn test_validation_errors_pass_through() {
        let err: CliError = SeparatorError::validation("Column order_number is blank in row 2").into();
        assert_eq!(
            err.to_string(),
            "Validation error: Column order_number is blank in row 2"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = CliError::NotFound(42);
        assert!(err.to_string().contains("separator fetch --id 42"));
    }
}
