//! Unified test utilities for mirrorsync tests
//!
//! Every fixture lives under one [`TempDir`] so a test only has to keep a
//! single guard alive.

use filetime::FileTime;
use mirrorsync_config::Config;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Base modification time used by fixtures, in seconds since the epoch
pub const BASE_MTIME: i64 = 1_700_000_000;

/// Contents and modification time of one file in a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File contents
    pub contents: Vec<u8>,
    /// Modification time in whole seconds
    pub mtime: i64,
}

/// Builder for a directory tree with pinned modification times
#[derive(Debug)]
pub struct TreeBuilder {
    root: PathBuf,
}

impl TreeBuilder {
    /// Create (if needed) and wrap `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).expect("Failed to create tree root");
        Self { root }
    }

    /// Root of the tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `contents` at the `/`-separated `path` with mtime `BASE_MTIME + offset`
    pub fn file(&self, path: &str, contents: &[u8], offset: i64) -> &Self {
        let full = self.path_of(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&full, contents).expect("Failed to write test file");
        set_mtime(&full, offset);
        self
    }

    /// Create an empty directory
    pub fn dir(&self, path: &str) -> &Self {
        fs::create_dir_all(self.path_of(path)).expect("Failed to create directory");
        self
    }

    /// Platform path of the `/`-separated `path`
    pub fn path_of(&self, path: &str) -> PathBuf {
        path.split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

/// Set the modification time of `path` to `BASE_MTIME + offset`
pub fn set_mtime(path: &Path, offset: i64) {
    let time = FileTime::from_unix_time(BASE_MTIME + offset, 0);
    filetime::set_file_mtime(path, time).expect("Failed to set modification time");
}

/// Every regular file under `root`, keyed by `/`-separated relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, TreeEntry> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("Entry outside of root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let metadata = entry.metadata().expect("Failed to read metadata");
            let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();
            let contents = fs::read(entry.path()).expect("Failed to read file");
            (relative, TreeEntry { contents, mtime })
        })
        .collect()
}

/// A source tree, any number of destination trees and a log directory
#[derive(Debug)]
pub struct MirrorFixture {
    temp: TempDir,
    /// Source tree
    pub source: TreeBuilder,
    /// Destination trees
    pub destinations: Vec<TreeBuilder>,
}

impl MirrorFixture {
    /// Fixture with `destinations` empty destination trees
    pub fn new(destinations: usize) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let source = TreeBuilder::new(temp.path().join("source"));
        let destinations = (0..destinations)
            .map(|i| TreeBuilder::new(temp.path().join(format!("dest{}", i))))
            .collect();
        Self {
            temp,
            source,
            destinations,
        }
    }

    /// First destination
    pub fn dest(&self) -> &TreeBuilder {
        &self.destinations[0]
    }

    /// Directory that receives sync logs
    pub fn log_dir(&self) -> PathBuf {
        self.temp.path().join("logs")
    }

    /// Scratch path inside the fixture that is not created
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Configuration pointing at this fixture
    pub fn config(&self, workers: usize) -> Config {
        Config {
            source_root: self.source.root().to_path_buf(),
            destinations: self
                .destinations
                .iter()
                .map(|d| d.root().to_path_buf())
                .collect(),
            workers: mirrorsync_types::WorkerCount::new(workers).expect("Invalid worker count"),
            log_dir: self.log_dir(),
            ..Config::default()
        }
    }

    /// Sync log files written so far
    pub fn log_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.log_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_builder_pins_mtime() {
        let fixture = MirrorFixture::new(1);
        fixture.source.file("2024/trip/a.jpg", b"abc", 5);

        let tree = read_tree(fixture.source.root());

        assert_eq!(tree.len(), 1);
        let entry = &tree["2024/trip/a.jpg"];
        assert_eq!(entry.contents, b"abc");
        assert_eq!(entry.mtime, BASE_MTIME + 5);
    }

    #[test]
    fn test_fixture_config_points_at_trees() {
        let fixture = MirrorFixture::new(2);
        let config = fixture.config(3);

        assert_eq!(config.destinations.len(), 2);
        assert_eq!(config.workers.get(), 3);
        assert!(fixture.log_files().is_empty());
    }
}
