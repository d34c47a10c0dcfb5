//! Progress bar utilities for CLI operations

use indicatif::{ProgressBar, ProgressStyle};
use separator_core::SaveProgress;

/// Create a progress bar for a batch save of `total` rows
pub fn create_save_progress(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%)")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Move `pb` to the position reported by the gateway
pub fn apply(pb: &ProgressBar, progress: SaveProgress) {
    pb.set_length(progress.total as u64);
    pb.set_position(progress.processed as u64);
}
