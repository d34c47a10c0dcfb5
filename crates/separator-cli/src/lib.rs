//! Separator CLI Library
//!
//! Command-line front end for separator records: validate and import sheets,
//! browse the record table, and apply edits through the reconciliation layer.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod error;
pub mod output;
pub mod progress;

pub use error::{CliError, Result};

/// Separator records command-line tool
#[derive(Parser)]
#[command(name = "separator")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that a sheet can be imported, without touching the database
    Validate {
        /// Path to the .csv, .xlsx or .xls file
        file: PathBuf,
    },

    /// Import a sheet and optionally save its records
    Import {
        /// Path to the .csv, .xlsx or .xls file
        file: PathBuf,

        /// Save the imported records to the database
        #[arg(long)]
        save: bool,

        /// Print the imported records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch records from the database
    ///
    /// Without filters the default view is shown: everything when there are
    /// fewer than 100 records, otherwise the last 7 days.
    Fetch {
        /// Earliest separation date (YYYY-MM-DD, inclusive)
        #[arg(long, value_name = "DATE")]
        from: Option<NaiveDate>,

        /// Latest separation date (YYYY-MM-DD, inclusive)
        #[arg(long, value_name = "DATE")]
        to: Option<NaiveDate>,

        /// Exact record id
        #[arg(long)]
        id: Option<String>,

        /// Order number contains (case-insensitive)
        #[arg(long, value_name = "TEXT")]
        order: Option<String>,

        /// Separator name contains (case-insensitive)
        #[arg(long, value_name = "TEXT")]
        separator: Option<String>,

        /// Only records marked for analysis
        #[arg(long)]
        analysis_only: bool,

        /// Only records from the last N days, today included
        #[arg(long, value_name = "DAYS", conflicts_with_all = ["from", "to"])]
        recent: Option<u64>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Connect through the read-only viewer
        #[arg(long)]
        read_only: bool,
    },

    /// Change fields of a stored record
    Update {
        /// Record id
        id: i64,

        /// New order number
        #[arg(long)]
        order: Option<String>,

        /// New separator name
        #[arg(long)]
        separator: Option<String>,

        /// New separation date (YYYY-MM-DD, with optional HH:MM:SS)
        #[arg(long, value_name = "DATE", conflicts_with = "clear_date")]
        date: Option<String>,

        /// Remove the separation date
        #[arg(long)]
        clear_date: bool,

        /// Mark or unmark the record for analysis (true/false)
        #[arg(long, value_name = "BOOL")]
        analysis: Option<bool>,
    },

    /// Delete a stored record
    Delete {
        /// Record id
        id: i64,
    },

    /// Inspect or create the record table
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
}

#[derive(Subcommand)]
pub enum SchemaCommand {
    /// Check that the record table has the expected columns
    Check,

    /// Create the record table if it does not exist
    Init,
}
