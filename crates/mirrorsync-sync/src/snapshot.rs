//! Point-in-time snapshots of a directory tree
//!
//! A walk records every regular file below the root with its size and
//! modification time. Directories are implied by file paths and symbolic
//! links are neither followed nor recorded, so a link cycle can never trap
//! the walk. Entries that disappear or cannot be read while the walk is in
//! progress are reported as [`SkippedEntry`] warnings instead of failing the
//! whole snapshot; only an unusable root is fatal.

use mirrorsync_types::{Error, FileRecord, RelativePath, Result, Timestamp};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Immutable mapping from relative path to file metadata for one tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    root: PathBuf,
    files: BTreeMap<RelativePath, FileRecord>,
}

impl Snapshot {
    /// Build a snapshot from records; a later record replaces an earlier one
    /// with the same path
    pub fn from_records<P, I>(root: P, records: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = FileRecord>,
    {
        let files = records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();
        Self {
            root: root.into(),
            files,
        }
    }

    /// Snapshot of a tree with no files
    pub fn empty<P: Into<PathBuf>>(root: P) -> Self {
        Self::from_records(root, std::iter::empty())
    }

    /// Root the snapshot was taken from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up the record for a path
    pub fn get(&self, path: &RelativePath) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Whether the snapshot holds a file at `path`
    pub fn contains(&self, path: &RelativePath) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the tree holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Records in path order
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Sum of all file sizes
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|record| record.size).sum()
    }
}

/// Entry that was skipped during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Absolute path of the entry
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Outcome of a walk: the snapshot plus non-fatal warnings
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Files found under the root
    pub snapshot: Snapshot,
    /// Entries that could not be recorded
    pub skipped: Vec<SkippedEntry>,
}

impl ScanReport {
    /// Whether any entry was skipped
    pub fn has_warnings(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Snapshot a tree without blocking the async runtime
pub async fn snapshot<P: AsRef<Path>>(root: P) -> Result<ScanReport> {
    let root = root.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || snapshot_blocking(&root))
        .await
        .map_err(|e| Error::other(format!("Snapshot task failed: {}", e)))?
}

/// Walk `root` on the current thread and record every regular file
pub fn snapshot_blocking(root: &Path) -> Result<ScanReport> {
    let metadata = std::fs::metadata(root).map_err(|e| Error::filesystem(root, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(Error::filesystem(root, "not a directory"));
    }
    // Surface an unreadable root as fatal instead of as a single warning
    std::fs::read_dir(root).map_err(|e| Error::filesystem(root, e.to_string()))?;

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let path = error.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                skip(&mut skipped, path, error.to_string());
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!("Skipping symlink: {}", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        match record_for(root, entry.path(), &entry) {
            Ok(record) => records.push(record),
            Err(reason) => skip(&mut skipped, entry.path().to_path_buf(), reason),
        }
    }

    let snapshot = Snapshot::from_records(root, records);
    info!(
        "Scanned {} files ({} bytes) in '{}', {} skipped",
        snapshot.len(),
        snapshot.total_size(),
        root.display(),
        skipped.len()
    );

    Ok(ScanReport { snapshot, skipped })
}

fn record_for(
    root: &Path,
    path: &Path,
    entry: &walkdir::DirEntry,
) -> std::result::Result<FileRecord, String> {
    let metadata = entry.metadata().map_err(|e| e.to_string())?;
    let relative = path
        .strip_prefix(root)
        .map_err(|_| "entry is outside the tree root".to_string())?;
    let relative = RelativePath::from_path(relative)?;
    let modified = metadata.modified().map_err(|e| e.to_string())?;

    Ok(FileRecord::new(
        relative,
        Timestamp::from_system_time(modified),
        metadata.len(),
    ))
}

fn skip(skipped: &mut Vec<SkippedEntry>, path: PathBuf, reason: String) {
    warn!("Skipping '{}': {}", path.display(), reason);
    skipped.push(SkippedEntry { path, reason });
}
