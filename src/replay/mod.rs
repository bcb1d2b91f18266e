//! Replay of queued operations against the backend.
//!
//! - `backoff`: bounded exponential retry policy
//! - `transport`: the network seam and its HTTP implementation
//! - `engine`: one drain pass over a queue type

pub mod backoff;
pub mod engine;
pub mod transport;

pub use backoff::{Decision, RetryPolicy};
pub use engine::{format_drain_report, DrainReport, ItemOutcome, ItemResult, ReplayEngine};
pub use transport::{HttpTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;
