//! Applying a change set to a destination tree
//!
//! [`apply`] turns a [`ChangeSet`] into copy tasks (added and updated files)
//! and delete tasks (removed files) and drains both lists concurrently, each
//! through its own [`WorkerPool`]. Per-task failures are collected in the
//! [`ApplyResult`]; they never stop sibling tasks.

use crate::executor::{copy_file, delete_file, InFlight};
use crate::pool::{PoolReport, WorkerPool};
use crate::task::{Task, TaskFailure};
use mirrorsync_sync::ChangeSet;
use mirrorsync_types::{
    ApplyPhase, NoopProgress, ProgressInfo, ProgressReporter, RelativePath, TaskError, WorkerCount,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Cancellation, timeout and progress settings for [`apply`]
///
/// Clones share the same cancellation signal.
#[derive(Clone)]
pub struct ApplyControl {
    cancel: Arc<watch::Sender<bool>>,
    task_timeout: Option<Duration>,
    progress: Arc<dyn ProgressReporter>,
}

impl ApplyControl {
    /// No timeout, no progress reporting, not cancelled
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
            task_timeout: None,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Fail tasks that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Report task completion to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Stop dispatching new tasks; in-flight tasks still finish
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether [`ApplyControl::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Configured per-task timeout
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }
}

impl Default for ApplyControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApplyControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyControl")
            .field("cancelled", &self.is_cancelled())
            .field("task_timeout", &self.task_timeout)
            .finish_non_exhaustive()
    }
}

/// Outcome of applying a change set
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApplyResult {
    /// Paths copied successfully
    pub copied: Vec<RelativePath>,
    /// Paths removed (or already absent)
    pub deleted: Vec<RelativePath>,
    /// Tasks that failed
    pub failed: Vec<TaskFailure>,
    /// Tasks never dispatched because the run was cancelled
    pub cancelled: Vec<Task>,
    /// Bytes written by successful copies
    pub bytes_copied: u64,
    /// Wall-clock time of the whole apply
    pub duration: Duration,
}

impl ApplyResult {
    /// Every task was attempted and succeeded
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    /// Paths of failed tasks, e.g. to build a retry change set
    pub fn failed_paths(&self) -> Vec<&RelativePath> {
        self.failed.iter().map(|failure| &failure.path).collect()
    }

    /// Number of tasks that succeeded
    pub fn succeeded(&self) -> usize {
        self.copied.len() + self.deleted.len()
    }

    /// Failed tasks that could succeed if run again unchanged
    pub fn retryable(&self) -> usize {
        self.failed
            .iter()
            .filter(|failure| failure.error.is_transient())
            .count()
    }

    fn absorb<R, F>(&mut self, report: PoolReport<Task, R>, mut on_success: F)
    where
        F: FnMut(&mut Self, RelativePath, R),
    {
        for (mut task, outcome) in report.finished {
            task.start();
            task.finish(&outcome);
            match outcome {
                Ok(value) => on_success(&mut *self, task.path, value),
                Err(error) => {
                    warn!("Task failed: {}: {}", task, error);
                    self.failed.push(TaskFailure {
                        task_id: task.id,
                        kind: task.kind,
                        path: task.path,
                        error,
                    });
                }
            }
        }
        for mut task in report.cancelled {
            task.cancel();
            self.cancelled.push(task);
        }
    }

    fn sort(&mut self) {
        self.copied.sort();
        self.deleted.sort();
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
        self.cancelled.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Apply `changes` to `dest_root`, copying from `source_root`
///
/// Returns once every task has been attempted (or cancelled), all workers
/// of both pools have exited and no abandoned copy is still writing. Re-running with the same change set after a
/// partial failure is safe.
pub async fn apply(
    changes: &ChangeSet,
    source_root: &Path,
    dest_root: &Path,
    workers: WorkerCount,
    control: &ApplyControl,
) -> ApplyResult {
    let started = Instant::now();
    let copy_tasks: Vec<Task> = changes.copy_paths().cloned().map(Task::copy).collect();
    let delete_tasks: Vec<Task> = changes.removed().iter().cloned().map(Task::delete).collect();

    info!(
        "Applying {} copies and {} deletions to '{}' with {} workers",
        copy_tasks.len(),
        delete_tasks.len(),
        dest_root.display(),
        workers.get()
    );

    let progress = &control.progress;
    progress.phase_started(ApplyPhase::Copy, copy_tasks.len());
    progress.phase_started(ApplyPhase::Delete, delete_tasks.len());

    let source_root: Arc<PathBuf> = Arc::new(source_root.to_path_buf());
    let dest_root: Arc<PathBuf> = Arc::new(dest_root.to_path_buf());
    let in_flight = InFlight::default();

    let copy_pool = WorkerPool::new(copy_tasks, workers).with_timeout(control.task_timeout);
    let copy_run = {
        let source_root = Arc::clone(&source_root);
        let dest_root = Arc::clone(&dest_root);
        let progress = Arc::clone(progress);
        let in_flight = in_flight.clone();
        copy_pool.run(
            move |mut task: Task| {
                let source_root = Arc::clone(&source_root);
                let dest_root = Arc::clone(&dest_root);
                let progress = Arc::clone(&progress);
                let in_flight = in_flight.clone();
                async move {
                    task.start();
                    debug!("Task {} in flight: {}", task.id, task);
                    let outcome = copy_file(&source_root, &dest_root, &task.path, &in_flight).await;
                    let bytes = outcome.as_ref().map_or(0, |bytes| *bytes);
                    report(&*progress, &task, bytes, outcome.is_ok());
                    outcome
                }
            },
            control.subscribe(),
        )
    };

    let delete_pool = WorkerPool::new(delete_tasks, workers).with_timeout(control.task_timeout);
    let delete_run = {
        let dest_root = Arc::clone(&dest_root);
        let progress = Arc::clone(progress);
        delete_pool.run(
            move |mut task: Task| {
                let dest_root = Arc::clone(&dest_root);
                let progress = Arc::clone(&progress);
                async move {
                    task.start();
                    debug!("Task {} in flight: {}", task.id, task);
                    let outcome = delete_file(&dest_root, &task.path).await;
                    report(&*progress, &task, 0, outcome.is_ok());
                    outcome
                }
            },
            control.subscribe(),
        )
    };

    let (copy_report, delete_report) = tokio::join!(copy_run, delete_run);
    // Copies abandoned by a timeout clean up before the result is reported
    in_flight.settle().await;
    progress.phase_finished(ApplyPhase::Copy);
    progress.phase_finished(ApplyPhase::Delete);

    let mut result = ApplyResult::default();
    result.absorb(copy_report, |result, path, bytes: u64| {
        result.bytes_copied += bytes;
        result.copied.push(path);
    });
    result.absorb(delete_report, |result, path, ()| {
        result.deleted.push(path);
    });
    result.sort();
    result.duration = started.elapsed();

    info!(
        "Applied changes to '{}': {} copied ({} bytes), {} deleted, {} failed, {} cancelled in {:?}",
        dest_root.display(),
        result.copied.len(),
        result.bytes_copied,
        result.deleted.len(),
        result.failed.len(),
        result.cancelled.len(),
        result.duration
    );

    result
}

fn report(progress: &dyn ProgressReporter, task: &Task, bytes: u64, succeeded: bool) {
    progress.report_progress(&ProgressInfo {
        phase: task.kind,
        path: task.path.clone(),
        bytes,
        succeeded,
    });
}

/// Classify a task error for display
pub fn describe_failure(error: &TaskError) -> &'static str {
    match error {
        TaskError::SourceMissing { .. } => "source missing",
        TaskError::PermissionDenied { .. } => "permission denied",
        TaskError::DestinationNotFile { .. } => "destination not a file",
        TaskError::TimedOut { .. } => "timed out",
        TaskError::Aborted { .. } => "aborted",
        TaskError::Io { .. } => "I/O error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;
    use mirrorsync_sync::{diff, snapshot_blocking, Snapshot};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn workers(n: usize) -> WorkerCount {
        WorkerCount::new(n).unwrap()
    }

    fn changes_between(source: &Path, dest: &Path) -> ChangeSet {
        let source = snapshot_blocking(source).unwrap().snapshot;
        let dest = snapshot_blocking(dest).unwrap().snapshot;
        diff(&source, &dest)
    }

    #[derive(Default)]
    struct CountingProgress {
        started: AtomicUsize,
        reported: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ProgressReporter for CountingProgress {
        fn phase_started(&self, _phase: ApplyPhase, _total: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn report_progress(&self, _info: &ProgressInfo) {
            self.reported.fetch_add(1, Ordering::SeqCst);
        }

        fn phase_finished(&self, _phase: ApplyPhase) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_apply_copies_and_deletes() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.jpg"), b"aaa").unwrap();
        std::fs::create_dir(source.path().join("sub")).unwrap();
        std::fs::write(source.path().join("sub/b.jpg"), b"bb").unwrap();
        std::fs::write(dest.path().join("c.jpg"), b"c").unwrap();

        let changes = changes_between(source.path(), dest.path());
        let progress = Arc::new(CountingProgress::default());
        let control = ApplyControl::new().with_progress(progress.clone());

        let result = apply(&changes, source.path(), dest.path(), workers(4), &control).await;

        assert!(result.is_complete_success());
        assert_eq!(result.copied.len(), 2);
        assert_eq!(result.deleted, vec![RelativePath::parse("c.jpg").unwrap()]);
        assert_eq!(result.bytes_copied, 5);
        assert_eq!(result.succeeded(), 3);
        assert!(dest.path().join("sub/b.jpg").exists());
        assert!(!dest.path().join("c.jpg").exists());

        assert_eq!(progress.started.load(Ordering::SeqCst), 2);
        assert_eq!(progress.reported.load(Ordering::SeqCst), 3);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_apply_empty_change_set() {
        let root = TempDir::new().unwrap();
        let result = apply(
            &ChangeSet::default(),
            root.path(),
            root.path(),
            workers(4),
            &ApplyControl::new(),
        )
        .await;

        assert!(result.is_complete_success());
        assert_eq!(result.succeeded(), 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            std::fs::write(source.path().join(name), name.as_bytes()).unwrap();
        }
        let changes = changes_between(source.path(), dest.path());
        // Source vanishes between diff and apply
        std::fs::remove_file(source.path().join("b.jpg")).unwrap();

        let control = ApplyControl::new();
        let result = apply(&changes, source.path(), dest.path(), workers(2), &control).await;

        assert_eq!(result.copied.len(), 2);
        assert_eq!(result.failed.len(), 1);
        let expected = RelativePath::parse("b.jpg").unwrap();
        assert_eq!(result.failed_paths(), vec![&expected]);
        assert!(matches!(result.failed[0].error, TaskError::SourceMissing { .. }));
        assert_eq!(result.failed[0].kind, ApplyPhase::Copy);
        assert!(!result.is_complete_success());
    }

    #[tokio::test]
    async fn test_cancel_before_apply_dispatches_nothing() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dest.path().join("old.jpg"), b"o").unwrap();
        let changes = changes_between(source.path(), dest.path());

        let control = ApplyControl::new();
        control.cancel();
        assert!(control.clone().is_cancelled());

        let result = apply(&changes, source.path(), dest.path(), workers(4), &control).await;

        assert_eq!(result.succeeded(), 0);
        assert_eq!(result.cancelled.len(), 2);
        assert!(result
            .cancelled
            .iter()
            .all(|task| task.state == TaskState::Cancelled));
        assert!(!dest.path().join("a.jpg").exists());
        assert!(dest.path().join("old.jpg").exists());
    }

    #[tokio::test]
    async fn test_timed_out_copy_is_found_again_by_the_next_diff() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("big.bin"), vec![1u8; 16 * 1024 * 1024]).unwrap();
        filetime::set_file_mtime(
            source.path().join("big.bin"),
            filetime::FileTime::from_unix_time(1_600_000_000, 0),
        )
        .unwrap();
        let changes = changes_between(source.path(), dest.path());

        let control = ApplyControl::new().with_timeout(Some(Duration::ZERO));
        let result = apply(&changes, source.path(), dest.path(), workers(1), &control).await;

        let again = changes_between(source.path(), dest.path());
        // No leftover temp file shows up as an extra destination file
        assert!(again.removed().is_empty());
        if let Some(failure) = result.failed.first() {
            assert!(matches!(failure.error, TaskError::TimedOut { .. }));
        }
        if again.is_empty() {
            // Only a complete copy may look up to date
            let copied = std::fs::read(dest.path().join("big.bin")).unwrap();
            assert_eq!(copied.len(), 16 * 1024 * 1024);
        } else {
            let big = RelativePath::parse("big.bin").unwrap();
            assert_eq!(again.copy_paths().collect::<Vec<_>>(), vec![&big]);
        }
    }

    #[tokio::test]
    async fn test_failed_subset_can_be_retried() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(source.path().join("b.jpg"), b"b").unwrap();
        // A directory in the way makes the first copy of b.jpg fail
        std::fs::create_dir(dest.path().join("b.jpg")).unwrap();

        let changes = diff(
            &snapshot_blocking(source.path()).unwrap().snapshot,
            &Snapshot::empty(dest.path()),
        );
        let control = ApplyControl::new();
        let first = apply(&changes, source.path(), dest.path(), workers(2), &control).await;
        assert_eq!(first.failed.len(), 1);
        assert_eq!(describe_failure(&first.failed[0].error), "destination not a file");
        assert_eq!(first.retryable(), 0);

        std::fs::remove_dir(dest.path().join("b.jpg")).unwrap();
        let failed = first.failed_paths();
        let retry = changes.subset(|path| failed.iter().any(|f| *f == path));
        let second = apply(&retry, source.path(), dest.path(), workers(2), &control).await;

        assert!(second.is_complete_success());
        assert_eq!(second.copied, vec![RelativePath::parse("b.jpg").unwrap()]);
        assert!(changes_between(source.path(), dest.path()).is_empty());
    }
}
