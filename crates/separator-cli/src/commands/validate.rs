//! `separator validate` command implementation
//!
//! Checks a sheet the same way `import` does, without touching the database.

use colored::Colorize;
use separator_core::import;
use std::path::Path;

use crate::error::Result;

/// Validate a sheet and report how many records it would produce
pub async fn run(file: &Path) -> Result<()> {
    let table = import::read_file(file)?;
    import::validate_table(&table)?;
    let set = separator_core::normalize(&table);

    let undated = set
        .original()
        .iter()
        .filter(|record| record.date_of_separation.is_none())
        .count();

    println!(
        "{} {} is valid: {} record(s)",
        "✓".green(),
        file.display(),
        set.len()
    );
    if undated > 0 {
        println!(
            "{} {} record(s) have no usable date of separation",
            "!".yellow(),
            undated
        );
    }
    Ok(())
}
