//! Background trigger coordinator.
//!
//! The coordinator is the page-independent context that turns connectivity
//! signals, explicit requests and push notifications into drain passes.
//!
//! - `trigger`: incoming events and their validation
//! - `sink`: best-effort delivery of triggers (background sync registration)
//! - `worker`: the coordinator thread and its handle
//! - `connectivity`: offline/online transition detection

pub mod connectivity;
pub mod sink;
pub mod trigger;
pub mod worker;

pub use connectivity::{spawn_watcher, Connectivity, ConnectivityMonitor};
pub use sink::{notify, notify_after, TriggerSink};
pub use trigger::{parse_push, Resolution, Trigger};
pub use worker::{Coordinator, CoordinatorHandle};

#[cfg(test)]
pub use sink::MockTriggerSink;
