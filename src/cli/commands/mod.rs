//! Command implementations for nexora-queue.
//!
//! Every command returns its output as a string; `main` prints it.

mod queue;
mod worker;

use std::path::PathBuf;

pub use queue::{clear, drain, enqueue, peek, send, status};
pub use worker::{push, trigger, worker};

use crate::cli::args::OutputFormat;
use crate::config::Config;
use crate::error::QueueError;
use crate::queue::OfflineQueue;
use crate::replay::{HttpTransport, RetryPolicy};

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub db_path: PathBuf,
    pub format: OutputFormat,
}

impl Context {
    /// Open the queue over the resolved database.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the store cannot be
    /// opened.
    pub fn open_queue(&self) -> Result<OfflineQueue, QueueError> {
        OfflineQueue::open_at(&self.db_path)
    }

    /// HTTP transport for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn transport(&self) -> Result<HttpTransport, QueueError> {
        HttpTransport::from_config(&self.config.network)
    }

    /// Retry policy from the `queue` config section.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.queue)
    }
}
