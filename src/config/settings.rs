//! Configuration settings for nexora-queue.
//!
//! Settings are loaded from `~/.nexora/config.yaml`. Every field has a
//! default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::QueueError;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Retry and backoff policy for replay.
    pub queue: QueueConfig,
    /// Backend endpoint settings.
    pub network: NetworkConfig,
    /// Background worker settings.
    pub worker: WorkerConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
}

/// Replay policy.
///
/// The shape (exponential with a cap, then eviction) is fixed; only the
/// constants are tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts after which an item is evicted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first re-trigger, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any re-trigger delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Backend endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Origin that `/api/<type>` paths are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional request timeout. `None` leaves it to the transport.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Path probed by the worker to detect connectivity.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

/// Background worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between connectivity probes. Zero disables the watcher.
    #[serde(default = "default_health_poll_secs")]
    pub health_poll_secs: u64,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

const fn default_health_poll_secs() -> u64 {
    15
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
            health_path: default_health_path(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            health_poll_secs: default_health_poll_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, QueueError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// holds an unusable value.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, QueueError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            QueueError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            QueueError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.queue.max_attempts == 0 {
            return Err(QueueError::Config(
                "queue.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.queue.base_delay_ms > self.queue.max_delay_ms {
            return Err(QueueError::Config(format!(
                "queue.base_delay_ms ({}) exceeds queue.max_delay_ms ({})",
                self.queue.base_delay_ms, self.queue.max_delay_ms
            )));
        }
        if self.network.base_url.trim().is_empty() {
            return Err(QueueError::Config("network.base_url is empty".to_string()));
        }
        Ok(())
    }
}
