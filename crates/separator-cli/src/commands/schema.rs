//! `separator schema` command implementation

use colored::Colorize;

use crate::commands::gateway;
use crate::error::Result;
use crate::progress;

/// Check that the record table exists with the expected columns
pub async fn check() -> Result<()> {
    let gateway = gateway()?;
    let spinner = progress::create_spinner("Checking record table...");
    let result = gateway.verify_schema().await;
    spinner.finish_and_clear();
    result?;

    println!("{} Table {} is ready", "✓".green(), gateway.table());
    Ok(())
}

/// Create the record table if it does not exist
pub async fn init() -> Result<()> {
    let gateway = gateway()?;
    let spinner = progress::create_spinner("Creating record table...");
    let result = gateway.create_schema().await;
    spinner.finish_and_clear();
    result?;

    println!("{} Table {} created or already present", "✓".green(), gateway.table());
    Ok(())
}
