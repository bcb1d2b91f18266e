//! nexora-queue - durable offline operation queue for the Nexora POS
//!
//! Write operations that cannot reach the backend are persisted in a local
//! SQLite store and replayed, per operation type, when a background trigger
//! arrives. Failed replays back off exponentially and are evicted after a
//! bounded number of attempts.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod producer;
pub mod queue;
pub mod replay;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use coordinator::{Coordinator, CoordinatorHandle, Trigger, TriggerSink};
pub use error::{DeliveryError, QueueError};
pub use producer::{Producer, Submission};
pub use queue::{OfflineQueue, QueueItem, QueueType};
pub use replay::{HttpTransport, ReplayEngine, RetryPolicy, Transport};
