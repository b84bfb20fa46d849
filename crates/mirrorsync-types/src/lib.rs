//! Core type system and error handling for mirrorsync
//!
//! This crate provides the foundational types shared by every mirrorsync crate:
//!
//! - **Error handling**: fatal [`Error`]s and per-task [`TaskError`]s
//! - **Core types**: [`RelativePath`], [`Timestamp`] and [`FileRecord`]
//! - **Traits**: progress reporting hooks used by the apply engine
//! - **Configuration**: validated newtypes such as [`WorkerCount`]
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use mirrorsync_types::{FileRecord, RelativePath, Timestamp};
//!
//! let path = RelativePath::parse("2024/trip/a.jpg").unwrap();
//! let record = FileRecord::new(path, Timestamp::from_secs(1_700_000_000), 4096);
//! assert_eq!(record.path.to_string(), "2024/trip/a.jpg");
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::WorkerCount;
pub use error::{Error, ErrorKind, ErrorSeverity, TaskError};
pub use result::Result;
pub use traits::*;
pub use types::*;
