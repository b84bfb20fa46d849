//! Progress bar fed by the apply engine

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use mirrorsync_types::{ApplyPhase, ProgressInfo, ProgressReporter};
use std::time::Duration;

/// Progress bar counting finished copy and delete tasks
pub struct ApplyProgressBar {
    progress_bar: ProgressBar,
}

impl ApplyProgressBar {
    /// Create a bar; a quiet bar draws nothing
    pub fn new(quiet: bool) -> Self {
        let progress_bar = ProgressBar::new(0);
        if quiet {
            progress_bar.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        {
            progress_bar.set_style(bar_style.progress_chars("█▉▊▋▌▍▎▏  "));
        }

        Self { progress_bar }
    }

    /// Clear counters before the next destination
    pub fn reset(&self) {
        self.progress_bar.reset();
        self.progress_bar.set_length(0);
        self.progress_bar.set_message(String::new());
    }

    /// Finish and remove the bar from the terminal
    pub fn finish_and_clear(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl ProgressReporter for ApplyProgressBar {
    fn phase_started(&self, _phase: ApplyPhase, total: usize) {
        if total > 0 {
            self.progress_bar.inc_length(total as u64);
            self.progress_bar.enable_steady_tick(Duration::from_millis(100));
        }
    }

    fn report_progress(&self, info: &ProgressInfo) {
        self.progress_bar.inc(1);
        let verb = match info.phase {
            ApplyPhase::Copy => "Copying",
            ApplyPhase::Delete => "Deleting",
        };
        self.progress_bar
            .set_message(format!("{}: {}", verb, info.path.file_name()));

        if !info.succeeded {
            self.progress_bar.suspend(|| {
                println!(
                    "  {} {} {}",
                    style("✗").red().bold(),
                    info.phase,
                    style(&info.path).red()
                );
            });
        }
    }

    fn phase_finished(&self, _phase: ApplyPhase) {}
}
