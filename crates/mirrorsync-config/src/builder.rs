//! Configuration builder for flexible configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat, Value};
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    overrides: Vec<(String, Value)>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            overrides: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Override the source root
    pub fn source_root<P: AsRef<Path>>(self, path: P) -> Self {
        let value = path.as_ref().to_string_lossy().into_owned();
        self.set_override("source_root", value)
    }

    /// Override the destination list
    pub fn destinations<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let values: Vec<String> = paths
            .into_iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned())
            .collect();
        self.set_override("destinations", values)
    }

    /// Override the worker count
    pub fn workers(self, count: usize) -> Self {
        self.set_override("workers", count as i64)
    }

    /// Override the per-task timeout
    pub fn task_timeout_secs(self, secs: u64) -> Self {
        self.set_override("task_timeout_secs", secs as i64)
    }

    /// Override the sync log directory
    pub fn log_dir<P: AsRef<Path>>(self, path: P) -> Self {
        let value = path.as_ref().to_string_lossy().into_owned();
        self.set_override("log_dir", value)
    }

    fn set_override<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<Config> {
        let config = self.build_unvalidated()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Build without validation, e.g. to display a partially filled config
    pub fn build_unvalidated(mut self) -> ConfigResult<Config> {
        // Start with defaults as the base configuration
        let defaults_value = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .separator(&self.env_separator)
                            .try_parsing(true)
                            .list_separator(",")
                            .with_list_parse_key("destinations"),
                    );
                }
                ConfigSource::Defaults => {
                    // Already handled above
                }
            }
        }

        for (key, value) in self.overrides {
            self.inner = self.inner.set_override(key, value)?;
        }

        let config = self.inner.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.source_root.as_os_str().is_empty() {
            return Err(ConfigError::missing_required("source_root"));
        }

        if config.destinations.is_empty() {
            return Err(ConfigError::missing_required("destinations"));
        }

        for (index, destination) in config.destinations.iter().enumerate() {
            if destination.as_os_str().is_empty() {
                return Err(ConfigError::invalid_value(
                    "destinations",
                    format!("entry {} is empty", index),
                ));
            }
            if destination == &config.source_root {
                return Err(ConfigError::validation(format!(
                    "Destination '{}' is the source root",
                    destination.display()
                )));
            }
            if config.destinations[..index].contains(destination) {
                return Err(ConfigError::validation(format!(
                    "Destination '{}' is listed more than once",
                    destination.display()
                )));
            }
        }

        config
            .workers
            .validate()
            .map_err(|message| ConfigError::invalid_value("workers", message))?;

        if config.task_timeout_secs == Some(0) {
            return Err(ConfigError::invalid_value(
                "task_timeout_secs",
                "must be greater than 0",
            ));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
