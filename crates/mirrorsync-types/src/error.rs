//! Error types and handling for mirrorsync
//!
//! Two families live here. [`Error`] covers failures that abort an operation
//! (a tree root that cannot be scanned, a bad configuration). [`TaskError`]
//! covers a single copy or delete that failed while the rest of the run
//! carried on; those are collected, never propagated with `?`.

use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation may be retried
    Medium,
    /// High severity - the current source/destination cycle is aborted
    High,
    /// Critical severity - entire process should be terminated
    Critical,
}

/// Main error type for mirrorsync operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// A tree root is missing, not a directory, or unreadable
    #[error("Filesystem error at '{path}': {message}")]
    Filesystem {
        /// Root path that could not be scanned
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Synchronization error
    #[error("Synchronization error: {message}")]
    Sync {
        /// Error message describing the synchronization issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Tree root errors raised while snapshotting
    Filesystem,
    /// Configuration errors
    Config,
    /// Synchronization errors
    Sync,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Config { .. } => ErrorKind::Config,
            Self::Sync { .. } => ErrorKind::Sync,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::Filesystem { .. } => ErrorSeverity::High,
            Self::Config { .. } => ErrorSeverity::Critical,
            Self::Sync { .. } => ErrorSeverity::Medium,
            Self::Cancelled => ErrorSeverity::Low,
            Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Whether this error ends the current source/destination cycle
    pub fn is_fatal(&self) -> bool {
        self.severity() >= ErrorSeverity::High
    }

    /// Create a new filesystem error for a tree root
    pub fn filesystem<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new sync error
    pub fn sync<S: Into<String>>(message: S) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

/// Failure of a single copy or delete task
///
/// Recorded against the task that produced it; sibling tasks keep running.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskError {
    /// Source file disappeared between the diff and the copy
    #[error("Source file vanished: {path}")]
    SourceMissing {
        /// Absolute source path
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path that could not be accessed
        path: PathBuf,
    },

    /// Something other than a regular file occupies the destination path
    #[error("Destination is not a regular file: {path}")]
    DestinationNotFile {
        /// Absolute destination path
        path: PathBuf,
    },

    /// Task exceeded the configured per-task timeout
    #[error("Task timed out after {seconds} seconds")]
    TimedOut {
        /// Timeout that elapsed
        seconds: u64,
    },

    /// The task panicked before it could finish
    #[error("Task aborted: {message}")]
    Aborted {
        /// Panic payload, or why the task stopped early
        message: String,
    },

    /// Any other I/O failure (disk full, device gone, ...)
    #[error("I/O error on '{path}': {message}")]
    Io {
        /// Path the failing operation targeted
        path: PathBuf,
        /// Error message from the I/O operation
        message: String,
    },
}

impl TaskError {
    /// Classify an I/O error raised while operating on `path`
    pub fn from_io(path: &Path, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                message: error.to_string(),
            },
        }
    }

    /// Whether re-running the same task later could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Io { .. })
    }
}
