//! Change detection between a source and a destination snapshot

use crate::snapshot::Snapshot;
use mirrorsync_types::{FileSize, RelativePath};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Category a path falls into when two snapshots are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// Present in the source only
    Added,
    /// Present in both and newer in the source
    Updated,
    /// Present in the destination only
    Removed,
    /// Present in both and not newer in the source
    Unchanged,
}

/// File that has to be copied, with its source-side size
///
/// Serialized as a `[path, size]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "(RelativePath, FileSize)", from = "(RelativePath, FileSize)")]
pub struct ChangedFile {
    /// Path relative to both roots
    pub path: RelativePath,
    /// Size of the source file
    pub size_bytes: FileSize,
}

impl From<ChangedFile> for (RelativePath, FileSize) {
    fn from(file: ChangedFile) -> Self {
        (file.path, file.size_bytes)
    }
}

impl From<(RelativePath, FileSize)> for ChangedFile {
    fn from((path, size_bytes): (RelativePath, FileSize)) -> Self {
        Self { path, size_bytes }
    }
}

/// Minimal set of operations that makes a destination match its source
///
/// The three lists are disjoint and sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(rename = "new")]
    added: Vec<ChangedFile>,
    #[serde(rename = "modified")]
    updated: Vec<ChangedFile>,
    #[serde(rename = "deleted")]
    removed: Vec<RelativePath>,
}

impl ChangeSet {
    /// Files missing from the destination
    pub fn added(&self) -> &[ChangedFile] {
        &self.added
    }

    /// Files that are newer in the source
    pub fn updated(&self) -> &[ChangedFile] {
        &self.updated
    }

    /// Files that no longer exist in the source
    pub fn removed(&self) -> &[RelativePath] {
        &self.removed
    }

    /// Whether the destination already matches the source
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of operations
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Paths to copy: added followed by updated
    pub fn copy_paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.added
            .iter()
            .chain(self.updated.iter())
            .map(|file| &file.path)
    }

    /// Category of `path`; paths the change set does not mention are unchanged
    pub fn classify(&self, path: &RelativePath) -> ChangeType {
        if self.added.binary_search_by(|f| f.path.cmp(path)).is_ok() {
            ChangeType::Added
        } else if self.updated.binary_search_by(|f| f.path.cmp(path)).is_ok() {
            ChangeType::Updated
        } else if self.removed.binary_search(path).is_ok() {
            ChangeType::Removed
        } else {
            ChangeType::Unchanged
        }
    }

    /// Change set restricted to the paths accepted by `keep`
    ///
    /// Used to re-run only the tasks that failed in an earlier apply.
    pub fn subset<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&RelativePath) -> bool,
    {
        Self {
            added: self.added.iter().filter(|f| keep(&f.path)).cloned().collect(),
            updated: self.updated.iter().filter(|f| keep(&f.path)).cloned().collect(),
            removed: self.removed.iter().filter(|p| keep(p)).cloned().collect(),
        }
    }
}

/// Compare two snapshots
///
/// A source file is updated only when its modification time is strictly
/// greater than the destination's; a size difference alone never counts.
pub fn diff(source: &Snapshot, dest: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for record in source.iter() {
        match dest.get(&record.path) {
            None => changes.added.push(ChangedFile {
                path: record.path.clone(),
                size_bytes: record.size,
            }),
            Some(existing) if record.modified > existing.modified => {
                changes.updated.push(ChangedFile {
                    path: record.path.clone(),
                    size_bytes: record.size,
                });
            }
            Some(_) => {}
        }
    }

    changes.removed = dest
        .iter()
        .filter(|record| !source.contains(&record.path))
        .map(|record| record.path.clone())
        .collect();

    debug!(
        "Diff '{}' -> '{}': {} added, {} updated, {} removed",
        source.root().display(),
        dest.root().display(),
        changes.added.len(),
        changes.updated.len(),
        changes.removed.len()
    );

    changes
}
