//! mirrorsync integration test support
//!
//! Shared fixtures for the cross-crate scenarios in `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Builders for source and destination trees with pinned modification
/// times, and helpers to inspect a tree after a run.
pub mod test_utils;
