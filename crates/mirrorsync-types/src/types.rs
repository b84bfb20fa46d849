//! Core data types for mirrorsync
//!
//! Paths inside a tree are always handled as [`RelativePath`]s so that a
//! snapshot taken on one platform compares cleanly with one taken on another.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File size in bytes
pub type FileSize = u64;

/// Path of a file relative to a tree root, stored as ordered segments
///
/// Displays (and serializes) with `/` separators on every platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath {
    segments: Vec<String>,
}

impl RelativePath {
    /// Create a relative path from individual segments
    pub fn from_segments<I, S>(segments: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err("Relative path must have at least one segment".to_string());
        }
        for segment in &segments {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(format!("Invalid path segment '{}'", segment));
            }
            if segment.contains('/') || segment.contains('\\') {
                return Err(format!("Path segment '{}' contains a separator", segment));
            }
        }
        Ok(Self { segments })
    }

    /// Parse a `/`-separated relative path such as `2024/trip/a.jpg`
    pub fn parse(value: &str) -> Result<Self, String> {
        Self::from_segments(value.split('/').filter(|s| !s.is_empty()))
    }

    /// Build from a platform path that is already relative to a root
    ///
    /// Fails on absolute paths, `..` components and names that are not UTF-8.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| format!("Path '{}' is not valid UTF-8", path.display()))?;
                    segments.push(name.to_string());
                }
                Component::CurDir => {}
                _ => {
                    return Err(format!(
                        "Path '{}' is not relative to the tree root",
                        path.display()
                    ))
                }
            }
        }
        Self::from_segments(segments)
    }

    /// Path segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Final segment
    pub fn file_name(&self) -> &str {
        // from_segments rejects empty paths
        self.segments.last().map_or("", String::as_str)
    }

    /// Rebuild the platform path of this entry under `root`
    pub fn join_onto(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl std::str::FromStr for RelativePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RelativePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RelativePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Modification time at whole-second resolution
///
/// Filesystems disagree on sub-second precision, so every timestamp is
/// floored to seconds since the Unix epoch before it is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from seconds since the Unix epoch
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Truncate a system time to whole seconds
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(after.as_secs() as i64),
            Err(before) => {
                let before = before.duration();
                let mut secs = -(before.as_secs() as i64);
                if before.subsec_nanos() > 0 {
                    secs -= 1;
                }
                Self(secs)
            }
        }
    }

    /// Seconds since the Unix epoch
    pub fn as_secs(self) -> i64 {
        self.0
    }

    /// Convert back to a system time
    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.0.unsigned_abs())
        }
    }
}

/// Metadata of one regular file inside a tree
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileRecord {
    /// Path relative to the tree root
    pub path: RelativePath,
    /// Last modification time
    pub modified: Timestamp,
    /// File size in bytes
    pub size: FileSize,
}

impl FileRecord {
    /// Create a new file record
    pub fn new(path: RelativePath, modified: Timestamp, size: FileSize) -> Self {
        Self {
            path,
            modified,
            size,
        }
    }
}

/// Phase of change application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApplyPhase {
    /// Copying new and updated files
    Copy,
    /// Removing files absent from the source
    Delete,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Progress of a single finished task
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Phase the task belonged to
    pub phase: ApplyPhase,
    /// Task path
    pub path: RelativePath,
    /// Bytes written by the task (zero for deletes)
    pub bytes: FileSize,
    /// Whether the task succeeded
    pub succeeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_relative_path_display_uses_forward_slashes() {
        let path = RelativePath::from_segments(["2024", "trip", "a.jpg"]).unwrap();
        assert_eq!(path.to_string(), "2024/trip/a.jpg");
        assert_eq!(path.file_name(), "a.jpg");
        assert_eq!(path.segments().len(), 3);
    }

    #[test]
    fn test_relative_path_from_platform_path() {
        let platform = Path::new("2024").join("trip").join("a.jpg");
        let path = RelativePath::from_path(&platform).unwrap();
        assert_eq!(path, RelativePath::parse("2024/trip/a.jpg").unwrap());
    }

    #[test]
    fn test_relative_path_join_onto_root() {
        let path = RelativePath::parse("dir/file.txt").unwrap();
        let joined = path.join_onto(Path::new("/backup"));
        assert_eq!(joined, Path::new("/backup").join("dir").join("file.txt"));
    }

    #[rstest]
    #[case("")]
    #[case("../escape.jpg")]
    #[case("a/./b")]
    fn test_relative_path_rejects_invalid(#[case] input: &str) {
        assert!(RelativePath::parse(input).is_err());
    }

    #[test]
    fn test_relative_path_rejects_absolute() {
        #[cfg(unix)]
        assert!(RelativePath::from_path(Path::new("/etc/passwd")).is_err());
        assert!(RelativePath::from_segments(["a\\b"]).is_err());
    }

    #[test]
    fn test_relative_path_ordering_is_segment_wise() {
        let mut paths = vec![
            RelativePath::parse("b.jpg").unwrap(),
            RelativePath::parse("a/z.jpg").unwrap(),
            RelativePath::parse("a.jpg").unwrap(),
        ];
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["a/z.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_timestamp_truncates_subsecond_precision() {
        let time = UNIX_EPOCH + Duration::from_millis(10_700);
        let ts = Timestamp::from_system_time(time);
        assert_eq!(ts.as_secs(), 10);
        assert_eq!(ts, Timestamp::from_system_time(UNIX_EPOCH + Duration::from_secs(10)));
    }

    #[test]
    fn test_timestamp_before_epoch_floors() {
        let time = UNIX_EPOCH - Duration::from_millis(1_500);
        assert_eq!(Timestamp::from_system_time(time).as_secs(), -2);
        assert_eq!(
            Timestamp::from_secs(-2).to_system_time(),
            UNIX_EPOCH - Duration::from_secs(2)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_relative_path_serializes_as_string() {
        let path = RelativePath::parse("dir/a.jpg").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"dir/a.jpg\"");
        let back: RelativePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
