//! Configuration management system for mirrorsync
//!
//! Replaces hard-coded paths and worker counts with an explicit [`Config`]
//! value that is passed to the sync runner. Configuration is layered:
//!
//! - **Defaults**: sensible values for everything except the paths
//! - **Files**: YAML, TOML or JSON (`mirrorsync.yaml`, ...)
//! - **Environment**: `MIRRORSYNC__WORKERS=8`, `MIRRORSYNC__DESTINATIONS=/a,/b`
//! - **Overrides**: explicit values, typically from command line flags
//!
//! # Examples
//!
//! ```rust,no_run
//! use mirrorsync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("mirrorsync.yaml")
//!     .add_env_prefix("MIRRORSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Workers: {}", config.workers.get());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use mirrorsync_types::WorkerCount;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for mirrorsync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tree that is mirrored
    pub source_root: PathBuf,
    /// Mirror roots, each synchronized independently
    pub destinations: Vec<PathBuf>,
    /// Workers per task category (copy and delete each get this many)
    pub workers: WorkerCount,
    /// Optional per-task timeout in seconds
    pub task_timeout_secs: Option<u64>,
    /// Directory that receives sync log records
    pub log_dir: PathBuf,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Completion notification configuration
    pub notifications: NotificationConfig,
}

impl Config {
    /// Per-task timeout, if one is configured
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            destinations: Vec::new(),
            workers: WorkerCount::default(),
            task_timeout_secs: None,
            log_dir: PathBuf::from("logs"),
            logging: LoggingConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            colored_output: true,
        }
    }
}

/// Completion notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send a notification after changes were applied
    pub enabled: bool,
    /// Notification title
    pub title: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: "Media Sync Completed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workers.get(), 4);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert!(config.destinations.is_empty());
        assert!(config.task_timeout().is_none());
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let config: Config = serde_yaml::from_str("source_root: /media/camera\n").unwrap();
        assert_eq!(config.source_root, PathBuf::from("/media/camera"));
        assert_eq!(config.workers.get(), 4);
        assert_eq!(config.logging.level, "info");
    }
}
