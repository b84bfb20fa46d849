//! Concurrent change application and sync runs for mirrorsync
//!
//! This crate turns a change set into filesystem mutations on a destination
//! tree and drives whole runs across several destinations.
//!
//! # Features
//!
//! - **Worker pools**: a fixed number of workers drain a shared task queue
//! - **Concurrent phases**: copies and deletions run side by side
//! - **Failure isolation**: a failed task never stops its siblings, a failed
//!   destination never stops the next one
//! - **Cancellation and timeouts**: via [`ApplyControl`]
//! - **Notifications**: pluggable [`Notifier`] called after changes are applied
//!
//! # Examples
//!
//! ```rust,no_run
//! use mirrorsync_config::ConfigLoader;
//! use mirrorsync_engine::{RunMode, SyncRunner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load_default()?;
//! let runner = SyncRunner::new(config);
//! for report in runner.run(RunMode::SyncAndLog).await {
//!     println!("{}: success = {}", report.destination.display(), report.is_success());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod executor;
pub mod notifier;
pub mod pool;
pub mod scheduler;
pub mod task;

pub use engine::{DestinationPlan, DestinationReport, DestinationRun, RunMode, SyncRunner};
pub use executor::{copy_file, delete_file, temp_path, InFlight};
pub use notifier::{notify_best_effort, LogNotifier, Notification, Notifier, DEFAULT_TITLE};
pub use pool::{PoolReport, WorkerPool};
pub use scheduler::{apply, describe_failure, ApplyControl, ApplyResult};
pub use task::{Task, TaskFailure, TaskId, TaskState};
