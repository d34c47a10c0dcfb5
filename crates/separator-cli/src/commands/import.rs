//! `separator import` command implementation
//!
//! Reads a sheet, shows the default view of its records and, with `--save`,
//! inserts them in one batch. Ctrl-C during the save stops submitting rows
//! and keeps the rows already inserted.

use colored::Colorize;
use separator_core::{import, PgRecordStore, Reconciler, RecordGateway, RecordSet, SaveControl, SaveReport};
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::{gateway, now};
use crate::error::Result;
use crate::{output, progress};

/// Import a sheet
pub async fn run(file: &Path, save: bool, json: bool) -> Result<()> {
    let mut set = import::import_file(file)?;

    if !save {
        return output::print_set(&set, json);
    }

    let gateway = gateway()?;
    let report = save_with_progress(&gateway, &mut set).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Persist the local-only records of `set`, driving a progress bar
async fn save_with_progress(
    gateway: &RecordGateway<PgRecordStore>,
    set: &mut RecordSet,
) -> Result<SaveReport> {
    let pending = set.original().iter().filter(|r| r.is_local_only()).count();
    eprintln!("{}", save_summary(set, pending));
    let bar = progress::create_save_progress(pending as u64, "Saving records (Ctrl-C to stop)");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let control = SaveControl::new()
        .with_progress(tx)
        .with_cancellation(cancel.clone());

    let reconciler = Reconciler::new(gateway);
    let save = reconciler.persist_new(set, control, now());
    tokio::pin!(save);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            result = &mut save => break result,
            Some(update) = rx.recv() => progress::apply(&bar, update),
            _ = &mut ctrl_c, if !cancel.is_cancelled() => {
                bar.set_message("Stopping after the current row...");
                cancel.cancel();
            },
        }
    };

    while let Ok(update) = rx.try_recv() {
        progress::apply(&bar, update);
    }
    bar.finish_and_clear();
    Ok(result?)
}

/// What a save is about to send, next to what the preview showed
fn save_summary(set: &RecordSet, pending: usize) -> String {
    let mut line = format!("Saving {} of {} record(s)", pending, set.len());
    if set.filtered().len() < set.len() {
        line.push_str(&format!(
            " (the preview shows only {} of them)",
            set.filtered().len()
        ));
    }
    line
}

fn print_report(report: &SaveReport) {
    if report.cancelled {
        println!(
            "{} Save cancelled: {} saved, {} not submitted",
            "!".yellow(),
            report.saved,
            report.not_submitted
        );
    } else {
        println!("{} Saved {} record(s)", "✓".green(), report.saved);
    }
    if report.skipped > 0 {
        println!(
            "{} Skipped {} duplicate record(s) already in the table",
            "!".yellow(),
            report.skipped
        );
    }
    if report.already_persisted > 0 {
        println!(
            "  {} record(s) already had an id and were not sent",
            report.already_persisted
        );
    }
}
