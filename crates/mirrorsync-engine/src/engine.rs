//! Per-destination sync runs
//!
//! A [`SyncRunner`] processes every configured destination on its own: it
//! snapshots the source and the destination, diffs them, and depending on
//! the [`RunMode`] writes a sync record, applies the changes and sends a
//! completion notification. A fatal error for one destination is captured in
//! its [`DestinationReport`] and the next destination is still processed.

use crate::notifier::{notify_best_effort, LogNotifier, Notification, Notifier};
use crate::scheduler::{apply, ApplyControl, ApplyResult};
use mirrorsync_config::Config;
use mirrorsync_sync::{
    diff, snapshot, summarize, ChangeSet, SkippedEntry, SyncLogWriter, SyncRecord, SyncSummary,
};
use mirrorsync_types::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a run does with the computed change set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunMode {
    /// Diff, summarize and write a sync record; the destination is not touched
    Preview,
    /// Diff and apply; no sync record
    Sync,
    /// Diff, write a sync record, then apply
    SyncAndLog,
}

impl RunMode {
    /// Whether the destination is modified
    pub fn applies(self) -> bool {
        matches!(self, Self::Sync | Self::SyncAndLog)
    }

    /// Whether a sync record is written
    pub fn writes_log(self) -> bool {
        matches!(self, Self::Preview | Self::SyncAndLog)
    }

    /// Interactive menu choice: `1` sync, `2` preview, `3` sync and log
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(Self::Sync),
            "2" => Some(Self::Preview),
            "3" => Some(Self::SyncAndLog),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preview => f.write_str("preview"),
            Self::Sync => f.write_str("sync"),
            Self::SyncAndLog => f.write_str("sync-and-log"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "preview" => Ok(Self::Preview),
            "sync" => Ok(Self::Sync),
            "sync-and-log" => Ok(Self::SyncAndLog),
            other => Err(format!("Unknown run mode '{}'", other)),
        }
    }
}

/// Diff of one destination against the source, before anything is changed
#[derive(Debug, Clone)]
pub struct DestinationPlan {
    /// Destination root
    pub destination: PathBuf,
    /// Computed changes
    pub changes: ChangeSet,
    /// Counters for the changes
    pub summary: SyncSummary,
    /// Entries skipped while walking either tree
    pub skipped: Vec<SkippedEntry>,
}

/// What happened to one destination after its plan was executed
#[derive(Debug, Clone)]
pub struct DestinationRun {
    /// Counters for the changes
    pub summary: SyncSummary,
    /// Entries skipped while walking either tree
    pub skipped: Vec<SkippedEntry>,
    /// Where the sync record was written, if the mode writes one
    pub log_path: Option<PathBuf>,
    /// Apply outcome, if the mode applies changes
    pub apply: Option<ApplyResult>,
}

/// Outcome for a single destination
#[derive(Debug)]
pub struct DestinationReport {
    /// Destination root
    pub destination: PathBuf,
    /// Mode the destination was processed in
    pub mode: RunMode,
    /// Result of the run, or the error that aborted it
    pub outcome: Result<DestinationRun>,
}

impl DestinationReport {
    /// No fatal error and no failed or cancelled task
    pub fn is_success(&self) -> bool {
        match &self.outcome {
            Ok(run) => run
                .apply
                .as_ref()
                .map_or(true, ApplyResult::is_complete_success),
            Err(_) => false,
        }
    }
}

/// Runs the configured source against every destination
pub struct SyncRunner {
    config: Arc<Config>,
    notifier: Arc<dyn Notifier>,
    control: ApplyControl,
}

impl SyncRunner {
    /// Create a runner that notifies through the log
    pub fn new(config: Config) -> Self {
        let control = ApplyControl::new().with_timeout(config.task_timeout());
        Self {
            config: Arc::new(config),
            notifier: Arc::new(LogNotifier),
            control,
        }
    }

    /// Use a different notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use a different apply control (progress, cancellation)
    ///
    /// The configured task timeout is kept unless the control sets its own.
    pub fn with_control(mut self, control: ApplyControl) -> Self {
        self.control = if control.task_timeout().is_some() {
            control
        } else {
            control.with_timeout(self.config.task_timeout())
        };
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply control shared by every destination
    pub fn control(&self) -> &ApplyControl {
        &self.control
    }

    /// Process every destination in order
    pub async fn run(&self, mode: RunMode) -> Vec<DestinationReport> {
        let mut reports = Vec::with_capacity(self.config.destinations.len());
        for destination in &self.config.destinations {
            reports.push(self.run_destination(destination, mode).await);
        }
        reports
    }

    /// Plan and execute one destination, capturing any fatal error
    pub async fn run_destination(&self, destination: &Path, mode: RunMode) -> DestinationReport {
        let outcome = match self.plan(destination).await {
            Ok(plan) => self.execute(&plan, mode).await,
            Err(e) => Err(e),
        };

        match &outcome {
            Err(e) if e.is_fatal() => {
                error!("Destination '{}' aborted: {}", destination.display(), e);
            }
            Err(e) => warn!("Destination '{}' skipped: {}", destination.display(), e),
            Ok(_) => {}
        }

        DestinationReport {
            destination: destination.to_path_buf(),
            mode,
            outcome,
        }
    }

    /// Snapshot both trees and compute the change set for `destination`
    pub async fn plan(&self, destination: &Path) -> Result<DestinationPlan> {
        if self.control.is_cancelled() {
            return Err(Error::Cancelled);
        }

        info!(
            "Checking changes for '{}' against '{}'",
            destination.display(),
            self.config.source_root.display()
        );

        let source = snapshot(&self.config.source_root).await?;
        let dest = snapshot(destination).await?;
        let changes = diff(&source.snapshot, &dest.snapshot);
        let summary = summarize(&changes);

        let mut skipped = source.skipped;
        skipped.extend(dest.skipped);
        if !skipped.is_empty() {
            warn!(
                "{} entries skipped while scanning for '{}'",
                skipped.len(),
                destination.display()
            );
        }

        info!("Changes for '{}': {}", destination.display(), summary);

        Ok(DestinationPlan {
            destination: destination.to_path_buf(),
            changes,
            summary,
            skipped,
        })
    }

    /// Carry out `mode` for a plan produced by [`SyncRunner::plan`]
    pub async fn execute(&self, plan: &DestinationPlan, mode: RunMode) -> Result<DestinationRun> {
        let log_path = if mode.writes_log() {
            let record = SyncRecord::new(
                &self.config.source_root,
                &plan.destination,
                plan.changes.clone(),
            );
            let writer = SyncLogWriter::new(&self.config.log_dir);
            Some(writer.write(&record).await?)
        } else {
            None
        };

        let apply_result = if mode.applies() {
            let result = apply(
                &plan.changes,
                &self.config.source_root,
                &plan.destination,
                self.config.workers,
                &self.control,
            )
            .await;

            if self.config.notifications.enabled {
                let notification =
                    Notification::from_summary(&self.config.notifications.title, &plan.summary);
                notify_best_effort(self.notifier.as_ref(), &notification);
            }

            Some(result)
        } else {
            None
        };

        Ok(DestinationRun {
            summary: plan.summary,
            skipped: plan.skipped.clone(),
            log_path,
            apply: apply_result,
        })
    }
}

impl fmt::Debug for SyncRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRunner")
            .field("config", &self.config)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        config: Config,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(source.join("a.jpg"), b"aa").unwrap();
        std::fs::write(dest.join("stale.jpg"), b"s").unwrap();

        let config = Config {
            source_root: source,
            destinations: vec![dest],
            log_dir: temp.path().join("logs"),
            ..Config::default()
        };
        Fixture {
            _temp: temp,
            config,
        }
    }

    #[rstest]
    #[case("1", Some(RunMode::Sync))]
    #[case("2", Some(RunMode::Preview))]
    #[case(" 3\n", Some(RunMode::SyncAndLog))]
    #[case("4", None)]
    fn test_menu_choice(#[case] input: &str, #[case] expected: Option<RunMode>) {
        assert_eq!(RunMode::from_choice(input), expected);
    }

    #[test]
    fn test_mode_round_trips_through_str() {
        for mode in [RunMode::Preview, RunMode::Sync, RunMode::SyncAndLog] {
            assert_eq!(mode.to_string().parse::<RunMode>().unwrap(), mode);
        }
        assert!("mirror".parse::<RunMode>().is_err());
    }

    #[tokio::test]
    async fn test_preview_writes_log_without_touching_destination() {
        let fixture = fixture();
        let dest = fixture.config.destinations[0].clone();
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = SyncRunner::new(fixture.config.clone()).with_notifier(notifier.clone());

        let reports = runner.run(RunMode::Preview).await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_success());
        let run = reports[0].outcome.as_ref().unwrap();
        assert!(run.apply.is_none());
        assert!(run.log_path.as_ref().unwrap().exists());
        assert_eq!(run.summary.new_files, 1);
        assert_eq!(run.summary.deleted_files, 1);
        assert!(!dest.join("a.jpg").exists());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_applies_and_notifies_without_log() {
        let fixture = fixture();
        let dest = fixture.config.destinations[0].clone();
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = SyncRunner::new(fixture.config.clone()).with_notifier(notifier.clone());

        let reports = runner.run(RunMode::Sync).await;

        let run = reports[0].outcome.as_ref().unwrap();
        assert!(run.log_path.is_none());
        assert!(run.apply.as_ref().unwrap().is_complete_success());
        assert!(dest.join("a.jpg").exists());
        assert!(!dest.join("stale.jpg").exists());
        assert!(!fixture.config.log_dir.exists());

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "Added: 1, Modified: 0, Deleted: 1");
    }

    #[tokio::test]
    async fn test_missing_destination_does_not_stop_the_next() {
        let fixture = fixture();
        let good = fixture.config.destinations[0].clone();
        let missing = good.with_file_name("missing");
        let config = Config {
            destinations: vec![missing.clone(), good.clone()],
            ..fixture.config.clone()
        };

        let reports = SyncRunner::new(config).run(RunMode::SyncAndLog).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].destination, missing);
        assert!(matches!(reports[0].outcome, Err(Error::Filesystem { .. })));
        assert!(!reports[0].is_success());
        assert!(reports[1].is_success());
        assert!(good.join("a.jpg").exists());
    }

    #[tokio::test]
    async fn test_cancelled_runner_skips_destinations() {
        let fixture = fixture();
        let control = ApplyControl::new();
        control.cancel();
        let runner = SyncRunner::new(fixture.config.clone()).with_control(control);

        let reports = runner.run(RunMode::Sync).await;

        assert!(matches!(reports[0].outcome, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_disabled_notifications() {
        let mut fixture = fixture();
        fixture.config.notifications.enabled = false;
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = SyncRunner::new(fixture.config.clone()).with_notifier(notifier.clone());

        runner.run(RunMode::Sync).await;

        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
