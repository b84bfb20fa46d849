//! Core traits for mirrorsync operations

use crate::{ApplyPhase, ProgressInfo};

/// Trait for reporting progress while a change set is applied
///
/// Called from worker tasks, so implementations must be thread safe.
pub trait ProgressReporter: Send + Sync {
    /// A phase is about to start with `total` tasks
    fn phase_started(&self, phase: ApplyPhase, total: usize);

    /// A single task reached a terminal state
    fn report_progress(&self, info: &ProgressInfo);

    /// Every task of the phase has been attempted
    fn phase_finished(&self, phase: ApplyPhase);
}

/// Progress reporter that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn phase_started(&self, _phase: ApplyPhase, _total: usize) {}

    fn report_progress(&self, _info: &ProgressInfo) {}

    fn phase_finished(&self, _phase: ApplyPhase) {}
}
