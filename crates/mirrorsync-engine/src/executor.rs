//! File operations performed by individual tasks

use filetime::FileTime;
use mirrorsync_types::{RelativePath, TaskError};
use std::fs::{self as std_fs, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::debug;

const CHUNK_SIZE: usize = 1024 * 1024;
const TEMP_SUFFIX: &str = ".mirrorsync-tmp";

/// Blocking copies that may outlive the task that started them
///
/// A timed-out task drops its future, but the blocking copy keeps running
/// until it notices. [`InFlight::settle`] waits for every such copy to stop.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<RwLock<()>>);

impl InFlight {
    /// Track a new blocking copy until the returned guard is dropped
    async fn enter(&self) -> OwnedRwLockReadGuard<()> {
        Arc::clone(&self.0).read_owned().await
    }

    /// Wait until no tracked copy is running
    pub async fn settle(&self) {
        drop(self.0.write().await);
    }
}

/// Sets the abort flag when the owning future is dropped before completion
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Copy `path` from `source_root` to `dest_root`, overwriting any existing
/// file and carrying over the source modification time
///
/// The contents land in a hidden sibling first and are renamed into place
/// once complete, so a failed or abandoned copy never leaves a partial file
/// under the destination name. Returns the number of bytes copied.
pub async fn copy_file(
    source_root: &Path,
    dest_root: &Path,
    path: &RelativePath,
    in_flight: &InFlight,
) -> Result<u64, TaskError> {
    let source = path.join_onto(source_root);
    let destination = path.join_onto(dest_root);

    let abort = Arc::new(AtomicBool::new(false));
    let _abort_on_drop = AbortOnDrop(Arc::clone(&abort));
    let tracked = in_flight.enter().await;

    let outcome = tokio::task::spawn_blocking(move || {
        let _tracked = tracked;
        copy_blocking(&source, &destination, &abort)
    })
    .await;

    let bytes = outcome.map_err(|e| TaskError::Aborted {
        message: e.to_string(),
    })??;
    debug!("Copied: {} ({} bytes)", path, bytes);
    Ok(bytes)
}

fn copy_blocking(source: &Path, destination: &Path, abort: &AtomicBool) -> Result<u64, TaskError> {
    let source_metadata = match std_fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => {
            return Err(TaskError::SourceMissing {
                path: source.to_path_buf(),
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TaskError::SourceMissing {
                path: source.to_path_buf(),
            })
        }
        Err(e) => return Err(TaskError::from_io(source, &e)),
    };

    // Symlinks are never written through
    if let Ok(existing) = std_fs::symlink_metadata(destination) {
        let file_type = existing.file_type();
        if file_type.is_dir() || file_type.is_symlink() {
            return Err(TaskError::DestinationNotFile {
                path: destination.to_path_buf(),
            });
        }
    }

    if let Some(parent) = destination.parent() {
        std_fs::create_dir_all(parent).map_err(|e| TaskError::from_io(parent, &e))?;
    }

    let temp = temp_path(destination);
    let written = write_temp(source, &temp, &source_metadata, abort).and_then(|bytes| {
        std_fs::rename(&temp, destination)
            .map(|()| bytes)
            .map_err(|e| TaskError::from_io(destination, &e))
    });
    if written.is_err() {
        // Best effort: the temp file may never have been created
        let _ = std_fs::remove_file(&temp);
    }
    written
}

/// Hidden sibling of `destination` that receives the contents
pub fn temp_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}{TEMP_SUFFIX}"))
}

fn write_temp(
    source: &Path,
    temp: &Path,
    source_metadata: &std_fs::Metadata,
    abort: &AtomicBool,
) -> Result<u64, TaskError> {
    let mut reader = File::open(source).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TaskError::SourceMissing {
            path: source.to_path_buf(),
        },
        _ => TaskError::from_io(source, &e),
    })?;
    let mut writer = File::create(temp).map_err(|e| TaskError::from_io(temp, &e))?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        if abort.load(Ordering::SeqCst) {
            return Err(TaskError::Aborted {
                message: "copy abandoned".to_string(),
            });
        }
        let read = reader
            .read(&mut buffer)
            .map_err(|e| TaskError::from_io(source, &e))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .map_err(|e| TaskError::from_io(temp, &e))?;
        total += read as u64;
    }
    writer.flush().map_err(|e| TaskError::from_io(temp, &e))?;
    drop(writer);

    // Permission bits travel with the contents
    std_fs::set_permissions(temp, source_metadata.permissions())
        .map_err(|e| TaskError::from_io(temp, &e))?;
    let mtime = FileTime::from_last_modification_time(source_metadata);
    filetime::set_file_mtime(temp, mtime).map_err(|e| TaskError::from_io(temp, &e))?;
    Ok(total)
}

/// Remove `path` from `dest_root`; a file that is already gone counts as
/// removed
pub async fn delete_file(dest_root: &Path, path: &RelativePath) -> Result<(), TaskError> {
    let target = path.join_onto(dest_root);

    match fs::remove_file(&target).await {
        Ok(()) => {
            debug!("Deleted: {}", path);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Already absent: {}", path);
            Ok(())
        }
        Err(e) => {
            if fs::symlink_metadata(&target)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
            {
                return Err(TaskError::DestinationNotFile { path: target });
            }
            Err(TaskError::from_io(&target, &e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn rel(value: &str) -> RelativePath {
        RelativePath::parse(value).unwrap()
    }

    #[tokio::test]
    async fn test_copy_creates_parents_and_preserves_mtime() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let file = source.path().join("2024/trip/a.jpg");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"photo").unwrap();
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        filetime::set_file_mtime(&file, FileTime::from_system_time(when)).unwrap();

        let bytes = copy_file(source.path(), dest.path(), &rel("2024/trip/a.jpg"), &InFlight::default())
            .await
            .unwrap();

        let copied = dest.path().join("2024/trip/a.jpg");
        assert_eq!(bytes, 5);
        assert_eq!(std::fs::read(&copied).unwrap(), b"photo");
        assert_eq!(std::fs::metadata(&copied).unwrap().modified().unwrap(), when);
    }

    #[tokio::test]
    async fn test_copy_overwrites_existing_file() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.jpg"), b"new").unwrap();
        std::fs::write(dest.path().join("a.jpg"), b"old contents").unwrap();

        copy_file(source.path(), dest.path(), &rel("a.jpg"), &InFlight::default())
            .await
            .unwrap();

        assert_eq!(std::fs::read(dest.path().join("a.jpg")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        let error = copy_file(source.path(), dest.path(), &rel("gone.jpg"), &InFlight::default())
            .await
            .unwrap_err();

        assert!(matches!(error, TaskError::SourceMissing { .. }));
    }

    #[tokio::test]
    async fn test_copy_onto_directory_fails() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.jpg"), b"x").unwrap();
        std::fs::create_dir(dest.path().join("a.jpg")).unwrap();

        let error = copy_file(source.path(), dest.path(), &rel("a.jpg"), &InFlight::default())
            .await
            .unwrap_err();

        assert!(matches!(error, TaskError::DestinationNotFile { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_onto_symlink_fails_without_touching_target() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("victim.txt");
        std::fs::write(source.path().join("a.jpg"), b"SOURCE").unwrap();
        std::fs::write(&victim, b"untouched").unwrap();
        std::os::unix::fs::symlink(&victim, dest.path().join("a.jpg")).unwrap();

        let error = copy_file(source.path(), dest.path(), &rel("a.jpg"), &InFlight::default())
            .await
            .unwrap_err();

        assert!(matches!(error, TaskError::DestinationNotFile { .. }));
        assert_eq!(std::fs::read(&victim).unwrap(), b"untouched");
        assert!(std::fs::symlink_metadata(dest.path().join("a.jpg"))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[test]
    fn test_abandoned_copy_keeps_old_file_and_removes_temp() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source_file = source.path().join("a.jpg");
        let dest_file = dest.path().join("a.jpg");
        std::fs::write(&source_file, b"new contents").unwrap();
        std::fs::write(&dest_file, b"old").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&dest_file, old).unwrap();

        let abort = AtomicBool::new(true);
        let error = copy_blocking(&source_file, &dest_file, &abort).unwrap_err();

        assert!(matches!(error, TaskError::Aborted { .. }));
        assert_eq!(std::fs::read(&dest_file).unwrap(), b"old");
        let metadata = std::fs::metadata(&dest_file).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), old);
        assert!(!temp_path(&dest_file).exists());
    }

    #[tokio::test]
    async fn test_timed_out_copy_never_leaves_partial_file() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source_file = source.path().join("big.bin");
        std::fs::write(&source_file, vec![7u8; 32 * CHUNK_SIZE]).unwrap();
        let when = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source_file, when).unwrap();

        let in_flight = InFlight::default();
        let big = rel("big.bin");
        let attempt = copy_file(source.path(), dest.path(), &big, &in_flight);
        let _ = tokio::time::timeout(Duration::ZERO, attempt).await;
        in_flight.settle().await;

        let dest_file = dest.path().join("big.bin");
        assert!(!temp_path(&dest_file).exists());
        // Either nothing was published or the whole file was
        if let Ok(metadata) = std::fs::metadata(&dest_file) {
            assert_eq!(metadata.len(), 32 * CHUNK_SIZE as u64);
            assert_eq!(FileTime::from_last_modification_time(&metadata), when);
        }
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path(Path::new("/backup/2024/a.jpg"));
        assert_eq!(temp, Path::new("/backup/2024/.a.jpg.mirrorsync-tmp"));
    }

    #[tokio::test]
    async fn test_delete_existing_and_absent() {
        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("c.jpg"), b"x").unwrap();

        delete_file(dest.path(), &rel("c.jpg")).await.unwrap();
        assert!(!dest.path().join("c.jpg").exists());

        // Second delete is a no-op success
        delete_file(dest.path(), &rel("c.jpg")).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_directory_fails() {
        let dest = TempDir::new().unwrap();
        std::fs::create_dir(dest.path().join("album")).unwrap();

        let error = delete_file(dest.path(), &rel("album")).await.unwrap_err();
        assert!(matches!(error, TaskError::DestinationNotFile { .. }));
        assert!(dest.path().join("album").exists());
    }
}
