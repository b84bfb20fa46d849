//! Persistent sync log records
//!
//! Each record is a pretty-printed JSON document named
//! `sync_log_<YYYYMMDD_HHMMSS>.json`. Two records written within the same
//! second get `_1`, `_2`, ... suffixes instead of replacing each other.

use crate::diff::ChangeSet;
use crate::summary::{summarize, SyncSummary};
use chrono::{DateTime, Local};
use mirrorsync_types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// One persisted description of a diff between a source and a destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Aggregate counters
    pub summary: SyncSummary,
    /// Full change lists
    pub changes: ChangeSet,
    /// Source root
    pub source: PathBuf,
    /// Destination root
    pub destination: PathBuf,
    /// When the record was created
    pub created_at: DateTime<Local>,
    /// Identifier of the run that produced the record
    pub run_id: Uuid,
}

impl SyncRecord {
    /// Build a record for a change set computed just now
    pub fn new<S, D>(source: S, destination: D, changes: ChangeSet) -> Self
    where
        S: Into<PathBuf>,
        D: Into<PathBuf>,
    {
        Self {
            summary: summarize(&changes),
            changes,
            source: source.into(),
            destination: destination.into(),
            created_at: Local::now(),
            run_id: Uuid::new_v4(),
        }
    }

    /// File name without collision suffix
    pub fn file_stem(&self) -> String {
        format!("sync_log_{}", self.created_at.format("%Y%m%d_%H%M%S"))
    }
}

/// Writes [`SyncRecord`]s into a log directory
#[derive(Debug, Clone)]
pub struct SyncLogWriter {
    log_dir: PathBuf,
}

impl SyncLogWriter {
    /// Create a writer for `log_dir`; the directory is created on first write
    pub fn new<P: Into<PathBuf>>(log_dir: P) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Target directory
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Persist `record` and return the path it was written to
    pub async fn write(&self, record: &SyncRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.log_dir)
            .await
            .map_err(|e| Error::filesystem(&self.log_dir, e.to_string()))?;

        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::sync(format!("Failed to serialize sync record: {}", e)))?;

        let stem = record.file_stem();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, attempt)
            };
            let path = self.log_dir.join(name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::filesystem(&path, e.to_string())),
            };

            file.write_all(&content)
                .await
                .map_err(|e| Error::filesystem(&path, e.to_string()))?;
            file.flush()
                .await
                .map_err(|e| Error::filesystem(&path, e.to_string()))?;

            info!("Sync log saved to {}", path.display());
            return Ok(path);
        }

        Err(Error::sync(format!(
            "No free sync log name for '{}' in {}",
            stem,
            self.log_dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::snapshot::Snapshot;
    use mirrorsync_types::{FileRecord, RelativePath, Timestamp};
    use tempfile::TempDir;

    fn sample_changes() -> ChangeSet {
        let source = Snapshot::from_records(
            "/src",
            vec![FileRecord::new(
                RelativePath::parse("a.jpg").unwrap(),
                Timestamp::from_secs(10),
                42,
            )],
        );
        diff(&source, &Snapshot::empty("/dst"))
    }

    #[tokio::test]
    async fn test_write_creates_log_dir_and_json_schema() {
        let temp_dir = TempDir::new().unwrap();
        let writer = SyncLogWriter::new(temp_dir.path().join("logs"));
        let record = SyncRecord::new("/src", "/dst", sample_changes());

        let path = writer.write(&record).await.unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("sync_log_"));
        assert!(name.ends_with(".json"));
        // sync_log_ + YYYYMMDD_HHMMSS + .json
        assert_eq!(name.len(), "sync_log_".len() + 15 + ".json".len());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["summary"]["new_files"], 1);
        assert_eq!(json["summary"]["modified_files"], 0);
        assert_eq!(json["summary"]["deleted_files"], 0);
        assert_eq!(json["summary"]["total_size_bytes"], 42);
        assert_eq!(json["changes"]["new"][0][0], "a.jpg");
        assert_eq!(json["destination"], "/dst");
    }

    #[tokio::test]
    async fn test_same_second_records_get_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        let writer = SyncLogWriter::new(temp_dir.path());
        let first = SyncRecord::new("/src", "/h", sample_changes());
        let second = SyncRecord {
            destination: PathBuf::from("/i"),
            ..first.clone()
        };
        let third = SyncRecord {
            destination: PathBuf::from("/j"),
            ..first.clone()
        };

        let a = writer.write(&first).await.unwrap();
        let b = writer.write(&second).await.unwrap();
        let c = writer.write(&third).await.unwrap();

        let stem = first.file_stem();
        assert_eq!(a, temp_dir.path().join(format!("{}.json", stem)));
        assert_eq!(b, temp_dir.path().join(format!("{}_1.json", stem)));
        assert_eq!(c, temp_dir.path().join(format!("{}_2.json", stem)));

        let stored: SyncRecord =
            serde_json::from_str(&std::fs::read_to_string(&b).unwrap()).unwrap();
        assert_eq!(stored.destination, PathBuf::from("/i"));
        assert_eq!(stored.changes, first.changes);
    }

    #[tokio::test]
    async fn test_log_dir_that_is_a_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("logs");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let writer = SyncLogWriter::new(&blocker);
        let record = SyncRecord::new("/src", "/dst", ChangeSet::default());

        assert!(writer.write(&record).await.is_err());
    }
}
