//! Path resolution for nexora-queue configuration and data files.
//!
//! All data is stored in `~/.nexora/`:
//! - `config.yaml` - Main configuration file
//! - `queue.db` - SQLite database holding queued operations

use std::path::PathBuf;

use crate::error::QueueError;

/// Paths to configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.nexora/`
    pub root: PathBuf,
    /// Config file: `~/.nexora/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.nexora/queue.db`
    pub database: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, QueueError> {
        let home = std::env::var("HOME")
            .map_err(|_| QueueError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".nexora")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("queue.db"),
            root,
        }
    }

    /// Ensure the root directory exists, creating it if necessary.
    ///
    /// A failure here means the queue has nowhere durable to live, so it is
    /// reported as [`QueueError::StorageUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), QueueError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                QueueError::StorageUnavailable(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }

        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| {
            // Fallback to current directory if home cannot be determined
            Self::with_root(PathBuf::from(".nexora"))
        })
    }
}
