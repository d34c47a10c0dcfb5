//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod delete;
pub mod fetch;
pub mod import;
pub mod schema;
pub mod update;
pub mod validate;

use chrono::{Local, NaiveDateTime};
use separator_core::{PgRecordStore, ProcessConfig, RecordGateway};

use crate::error::Result;

/// Gateway configured from the process environment
pub(crate) fn gateway() -> Result<RecordGateway<PgRecordStore>> {
    Ok(RecordGateway::postgres(ProcessConfig::from_env())?)
}

/// Local wall-clock time, the reference for the default view
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
