//! Offline operation queue.
//!
//! Write operations that could not reach the backend are persisted here and
//! replayed later by the coordinator.
//!
//! - `item`: the closed set of queue types and the queued record
//! - `store`: transactional persistence over SQLite
//! - `api`: the [`OfflineQueue`] used by producers and the host

pub mod api;
pub mod item;
pub mod store;

pub use api::{OfflineQueue, QueueStats};
pub use item::{QueueItem, QueueType, SYNC_TAG_PREFIX};
pub use store::OperationStore;
