//! Aggregate counters for a change set

use crate::diff::ChangeSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts per change category plus the bytes that have to be transferred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Files missing from the destination
    pub new_files: usize,
    /// Files newer in the source
    pub modified_files: usize,
    /// Files to remove from the destination
    pub deleted_files: usize,
    /// Combined source size of new and modified files
    pub total_size_bytes: u64,
}

impl SyncSummary {
    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }

    /// Number of copy and delete operations
    pub fn total_changes(&self) -> usize {
        self.new_files + self.modified_files + self.deleted_files
    }

    /// One-line message used for completion notifications
    pub fn notification_message(&self) -> String {
        format!(
            "Added: {}, Modified: {}, Deleted: {}",
            self.new_files, self.modified_files, self.deleted_files
        )
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} modified, {} deleted ({} bytes to copy)",
            self.new_files, self.modified_files, self.deleted_files, self.total_size_bytes
        )
    }
}

/// Reduce a change set to its summary
pub fn summarize(changes: &ChangeSet) -> SyncSummary {
    SyncSummary {
        new_files: changes.added().len(),
        modified_files: changes.updated().len(),
        deleted_files: changes.removed().len(),
        total_size_bytes: changes
            .added()
            .iter()
            .chain(changes.updated())
            .map(|file| file.size_bytes)
            .sum(),
    }
}
