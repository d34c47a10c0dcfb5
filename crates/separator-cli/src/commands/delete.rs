//! `separator delete` command implementation

use colored::Colorize;
use separator_core::RecordId;

use crate::commands::gateway;
use crate::error::{CliError, Result};

/// Delete one stored record
pub async fn run(id: RecordId) -> Result<()> {
    if !gateway()?.delete(id).await? {
        return Err(CliError::NotFound(id));
    }
    println!("{} Deleted record {}", "✓".green(), id);
    Ok(())
}
