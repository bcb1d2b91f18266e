//! The interface producers and the host use to reach the queue.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::item::{QueueItem, QueueType};
use super::store::OperationStore;
use crate::coordinator::{notify, Trigger, TriggerSink};
use crate::error::QueueError;

/// Offline operation queue.
pub struct OfflineQueue {
    store: OperationStore,
    sink: Option<Arc<dyn TriggerSink>>,
}

impl OfflineQueue {
    /// Open the queue at the default location, without background sync.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the store cannot be
    /// opened.
    pub fn new() -> Result<Self, QueueError> {
        Ok(Self::with_store(OperationStore::open()?))
    }

    /// Open the queue over a specific database file.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::StorageUnavailable`] if the store cannot be
    /// opened.
    pub fn open_at(path: &Path) -> Result<Self, QueueError> {
        Ok(Self::with_store(OperationStore::open_at(path)?))
    }

    /// Create a queue over an existing store.
    #[must_use]
    pub const fn with_store(store: OperationStore) -> Self {
        Self { store, sink: None }
    }

    /// Attach a background-sync capability.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TriggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Access the underlying store.
    #[must_use]
    pub const fn store(&self) -> &OperationStore {
        &self.store
    }

    /// Persist a new operation and register a wake-up for its type.
    ///
    /// Once this returns `Ok` the operation is durable. The wake-up is
    /// best-effort and its failure does not affect the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation cannot be persisted.
    pub fn enqueue(&self, queue_type: QueueType, payload: Value) -> Result<QueueItem, QueueError> {
        let mut item = QueueItem::new(queue_type, payload);
        let id = self.store.insert(&mut item)?;
        debug!(id, queue = %queue_type, "queued operation");

        notify(self.sink.as_deref(), Trigger::sync_for(queue_type));

        Ok(item)
    }

    /// Enqueue by wire name, rejecting names outside the closed set.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownType`] before touching the store if the
    /// name is not a known type, or any error from [`Self::enqueue`].
    pub fn enqueue_tag(&self, queue_type: &str, payload: Value) -> Result<QueueItem, QueueError> {
        let queue_type = queue_type.parse::<QueueType>()?;
        self.enqueue(queue_type, payload)
    }

    /// Pending operations of one type, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn peek(&self, queue_type: QueueType) -> Result<Vec<QueueItem>, QueueError> {
        self.store.read_all_by_type(queue_type)
    }

    /// Ask the coordinator to drain one type soon.
    ///
    /// Returns whether the request was handed off. Without background sync
    /// nothing happens and the caller should drain in the foreground.
    pub fn request_drain(&self, queue_type: QueueType) -> bool {
        notify(self.sink.as_deref(), Trigger::message_for(queue_type))
    }

    /// Ask the coordinator to drain every type, after coming back online.
    pub fn request_drain_all(&self) -> bool {
        notify(self.sink.as_deref(), Trigger::DrainAll)
    }

    /// Queue statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let by_type = self.store.counts_by_type()?;
        let pending = by_type.iter().map(|(_, count)| count).sum();

        Ok(QueueStats {
            pending,
            by_type,
            oldest_pending: self.store.oldest_created_at()?,
        })
    }

    /// Remove every queued operation (for testing/reset).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize, QueueError> {
        self.store.clear()
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Total pending operations
    pub pending: i64,
    /// Pending operations per type (types with none are omitted)
    pub by_type: Vec<(QueueType, i64)>,
    /// Oldest pending operation timestamp
    pub oldest_pending: Option<DateTime<Utc>>,
}
