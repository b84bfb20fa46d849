//! Console output for mirrorsync

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use mirrorsync_engine::{
    describe_failure, ApplyResult, DestinationReport, Notification, Notifier,
};
use mirrorsync_sync::{SkippedEntry, SyncSummary};
use mirrorsync_types::Result;
use std::path::Path;
use std::time::Duration;

/// Header printed before a destination is processed
pub fn display_destination_header(destination: &Path) {
    println!();
    println!(
        "{} {}",
        style("---").dim(),
        style(format!("Checking changes for {}", destination.display())).bold()
    );
}

/// Print the change summary of one destination
pub fn display_summary(summary: &SyncSummary, skipped: &[SkippedEntry]) {
    println!("{}", style("Summary:").bold().underlined());
    println!("  New files: {}", style(summary.new_files).green());
    println!("  Modified files: {}", style(summary.modified_files).yellow());
    println!("  Deleted files: {}", style(summary.deleted_files).red());
    println!(
        "  To transfer: {}",
        style(format_bytes(summary.total_size_bytes)).cyan()
    );

    if !skipped.is_empty() {
        display_warning(&format!("{} entries could not be scanned:", skipped.len()));
        for entry in skipped {
            println!("    • {}", style(entry).dim());
        }
    }
}

/// Print the outcome of applying changes
pub fn display_apply_result(result: &ApplyResult) {
    println!("{}", style("Apply Statistics:").bold().underlined());
    println!("  Files copied: {}", style(result.copied.len()).green());
    println!("  Files deleted: {}", style(result.deleted.len()).green());
    println!(
        "  Bytes copied: {}",
        style(format_bytes(result.bytes_copied)).green()
    );
    println!(
        "  Failures: {}",
        if result.failed.is_empty() {
            style(result.failed.len()).green()
        } else {
            style(result.failed.len()).red()
        }
    );
    if !result.cancelled.is_empty() {
        println!("  Cancelled: {}", style(result.cancelled.len()).yellow());
    }
    println!(
        "  Duration: {}",
        style(format_duration(result.duration)).blue()
    );

    for failure in &result.failed {
        println!(
            "    {} {} {} ({}): {}",
            style("✗").red(),
            failure.kind,
            style(&failure.path).red(),
            describe_failure(&failure.error),
            style(&failure.error).dim()
        );
    }

    let retryable = result.retryable();
    if retryable > 0 {
        display_info(&format!(
            "{} of {} failures may succeed on a rerun",
            retryable,
            result.failed.len()
        ));
    }
}

/// Print one line per destination after all of them were processed
pub fn display_overview(reports: &[DestinationReport]) {
    if reports.len() < 2 {
        return;
    }

    println!();
    println!("{}", style("Overview:").bold().underlined());
    for report in reports {
        let status = match &report.outcome {
            Ok(_) if report.is_success() => style("ok".to_string()).green(),
            Ok(run) => {
                let failed = run.apply.as_ref().map_or(0, |a| a.failed.len());
                style(format!("{} failed", failed)).yellow()
            }
            Err(e) => style(e.to_string()).red(),
        };
        println!(
            "  {} [{}] {}",
            style(report.destination.display()).cyan(),
            report.mode,
            status
        );
    }
}

/// Create a spinner, or nothing in quiet mode
pub fn create_spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Notifier that prints a highlighted line to the terminal
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    quiet: bool,
}

impl ConsoleNotifier {
    /// Create a console notifier
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!("{}: {}", notification.title, notification.message);
        if !self.quiet {
            println!(
                "{} {} {}",
                style("🔔").yellow(),
                style(&notification.title).bold(),
                notification.message
            );
        }
        Ok(())
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    println!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}
