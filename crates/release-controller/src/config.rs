use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::queue::Backoff;
use crate::resolver::AmbiguityPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Seed manifests loaded before the controller starts
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Controller validations
        if self.controller.workers == 0 {
            return Err("controller.workers must be > 0".into());
        }
        if self.controller.event_capacity == 0 {
            return Err("controller.event_capacity must be > 0".into());
        }
        if self.controller.retry_base_delay_ms == 0 {
            return Err("controller.retry_base_delay_ms must be > 0".into());
        }
        if self.controller.retry_base_delay_ms > self.controller.retry_max_delay_ms {
            return Err(
                "controller.retry_base_delay_ms must be <= controller.retry_max_delay_ms".into(),
            );
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Bootstrap validation
        if let Some(dir) = &self.bootstrap.seed_dir {
            if dir.trim().is_empty() {
                return Err("bootstrap.seed_dir must not be empty when set".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Concurrent reconciliations (distinct Release keys)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the watch notification channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// `strict` or `first_by_name`
    #[serde(default)]
    pub ambiguous_target: AmbiguityPolicy,
}

impl ControllerConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            event_capacity: default_event_capacity(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            ambiguous_target: AmbiguityPolicy::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_event_capacity() -> usize {
    1024
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    /// Directory of `*.json` manifests, each a record or an array of records
    #[serde(default)]
    pub seed_dir: Option<String>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, looked up in the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "release-service.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., RELEASE_SERVICE__CONTROLLER__WORKERS=8
        builder = builder.add_source(
            Environment::with_prefix("RELEASE_SERVICE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
