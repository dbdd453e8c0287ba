//! TOML configuration with environment overrides.
//!
//! ```toml
//! [monitoring]
//! enabled = true
//! save_dir = "./logs/performance"
//!
//! [progress]
//! send_timeout_ms = 5000
//! channel_buffer = 64
//!
//! [recovery]
//! repair = true
//!
//! [logging]
//! json = false
//! level = "info"
//! ```
//!
//! Every section and field is optional. `SUBSTRATE_PERF_DIR` and
//! `SUBSTRATE_PERF_ENABLED` override the monitoring section.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use perf_tracker::PerfConfig;
use progress_hub::HubConfig;
use serde::{Deserialize, Serialize};
use structured_recovery::RecoveryConfig;
use tracing::Level;

use crate::error::ConfigError;

pub const ENV_PERF_DIR: &str = "SUBSTRATE_PERF_DIR";
pub const ENV_PERF_ENABLED: &str = "SUBSTRATE_PERF_ENABLED";

/// `[progress]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Per-subscriber delivery bound (milliseconds).
    pub send_timeout_ms: u64,
    /// Capacity of mpsc-backed subscriber sinks.
    pub channel_buffer: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            channel_buffer: 64,
        }
    }
}

impl ProgressConfig {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level: {:?}", self.level)))
    }
}

/// Complete substrate configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstrateConfig {
    pub monitoring: PerfConfig,
    pub progress: ProgressConfig,
    pub recovery: RecoveryConfig,
    pub logging: LoggingConfig,
}

impl SubstrateConfig {
    /// Read `path`, apply environment overrides, and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML only. No environment lookups, no validation.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_PERF_DIR).filter(|d| !d.trim().is_empty()) {
            self.monitoring.save_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_PERF_ENABLED) {
            self.monitoring.enabled = parse_flag(&raw).ok_or_else(|| {
                ConfigError::Invalid(format!("{ENV_PERF_ENABLED} must be true|false|1|0, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.progress.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "progress.send_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.progress.channel_buffer == 0 {
            return Err(ConfigError::Invalid(
                "progress.channel_buffer must be greater than 0".into(),
            ));
        }
        if self.monitoring.save_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("monitoring.save_dir must not be empty".into()));
        }
        self.logging.level()?;
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
