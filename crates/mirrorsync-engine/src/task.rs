//! Copy and delete tasks

use mirrorsync_types::{ApplyPhase, RelativePath, TaskError};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new task ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskState {
    /// Waiting in the queue
    Pending,
    /// Taken by a worker
    InFlight,
    /// Finished successfully
    Done,
    /// Finished with an error
    Failed(TaskError),
    /// Never dispatched because the run was cancelled
    Cancelled,
}

impl TaskState {
    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }
}

/// A single file operation against a destination tree
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// Copy or delete
    pub kind: ApplyPhase,
    /// Path relative to both roots
    pub path: RelativePath,
    /// Current state
    pub state: TaskState,
}

impl Task {
    /// Task that copies `path` from the source to the destination
    pub fn copy(path: RelativePath) -> Self {
        Self::new(ApplyPhase::Copy, path)
    }

    /// Task that removes `path` from the destination
    pub fn delete(path: RelativePath) -> Self {
        Self::new(ApplyPhase::Delete, path)
    }

    fn new(kind: ApplyPhase, path: RelativePath) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            path,
            state: TaskState::Pending,
        }
    }

    /// Mark the task as taken by a worker
    pub fn start(&mut self) {
        if self.state == TaskState::Pending {
            self.state = TaskState::InFlight;
        }
    }

    /// Record the outcome of an attempt
    pub fn finish<T>(&mut self, outcome: &Result<T, TaskError>) {
        self.state = match outcome {
            Ok(_) => TaskState::Done,
            Err(error) => TaskState::Failed(error.clone()),
        };
    }

    /// Mark a task that was never dispatched as cancelled
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Cancelled;
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// A task that finished with an error
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskFailure {
    /// Identifier of the failed task
    pub task_id: TaskId,
    /// Copy or delete
    pub kind: ApplyPhase,
    /// Path relative to both roots
    pub path: RelativePath,
    /// What went wrong
    pub error: TaskError,
}
