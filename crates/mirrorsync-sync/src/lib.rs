//! Tree snapshots, change detection and sync records for mirrorsync
//!
//! This crate holds the read-only half of a mirror run:
//!
//! - **Snapshots**: walk a tree and record size and modification time per file
//! - **Diffing**: compare a source and a destination snapshot into a [`ChangeSet`]
//! - **Summaries**: reduce a change set to counters for display and notification
//! - **Sync records**: persist a change set as a timestamped JSON log
//!
//! # Examples
//!
//! ```rust,no_run
//! use mirrorsync_sync::{diff, snapshot, summarize};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = snapshot("/media/camera").await?;
//! let dest = snapshot("/backup/camera").await?;
//! let changes = diff(&source.snapshot, &dest.snapshot);
//! println!("{}", summarize(&changes));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod record;
pub mod snapshot;
pub mod summary;

pub use diff::{diff, ChangeSet, ChangeType, ChangedFile};
pub use record::{SyncLogWriter, SyncRecord};
pub use snapshot::{snapshot, snapshot_blocking, ScanReport, Snapshot, SkippedEntry};
pub use summary::{summarize, SyncSummary};
