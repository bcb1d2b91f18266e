//! Configuration management for nexora-queue.
//!
//! This module handles loading and saving configuration from `~/.nexora/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{Config, GeneralConfig, LoggingConfig, NetworkConfig, QueueConfig, WorkerConfig};
