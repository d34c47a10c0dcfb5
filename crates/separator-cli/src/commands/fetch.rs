//! `separator fetch` command implementation
//!
//! Loads records through the gateway and prints the resulting view.

use chrono::{Local, NaiveDate};
use separator_core::{FilterCriteria, ProcessConfig, ReadOnlyGateway};

use crate::commands::gateway;
use crate::error::Result;
use crate::output;

/// Filters and output switches for `fetch`
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub id: Option<String>,
    pub order: Option<String>,
    pub separator: Option<String>,
    pub analysis_only: bool,
    pub recent: Option<u64>,
    pub json: bool,
    pub read_only: bool,
}

impl FetchOptions {
    /// Criteria for the store query
    ///
    /// `--recent` supplies the date bounds; otherwise `--from` and `--to` do.
    pub fn criteria(&self, today: NaiveDate) -> FilterCriteria {
        let mut criteria = match self.recent {
            Some(days) => FilterCriteria::trailing_days(today, days),
            None => FilterCriteria::new(),
        };
        if let Some(from) = self.from {
            criteria = criteria.from_date(from);
        }
        if let Some(to) = self.to {
            criteria = criteria.to_date(to);
        }
        if let Some(ref id) = self.id {
            criteria = criteria.record_id(id.clone());
        }
        if let Some(ref order) = self.order {
            criteria = criteria.order_number_contains(order.clone());
        }
        if let Some(ref separator) = self.separator {
            criteria = criteria.separator_name_contains(separator.clone());
        }
        criteria.analysis_only(self.analysis_only)
    }
}

/// Fetch and print records
pub async fn run(options: FetchOptions) -> Result<()> {
    let criteria = options.criteria(Local::now().date_naive());

    let set = if options.read_only {
        ReadOnlyGateway::postgres(ProcessConfig::from_env())?
            .fetch(&criteria)
            .await?
    } else {
        gateway()?.fetch(&criteria).await?
    };

    output::print_set(&set, options.json)
}
