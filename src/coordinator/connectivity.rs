//! Offline/online transition detection for the foreground.
//!
//! Any number of types may have queued work while the device was offline, so
//! a transition back online asks for every type to be drained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::QueueError;
use crate::queue::OfflineQueue;
use crate::replay::Transport;

/// Network connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Backend reachable.
    Online,
    /// Backend unreachable.
    Offline,
}

/// Tracks connectivity and reports when a drain of every type is due.
#[derive(Debug, Default)]
pub struct ConnectivityMonitor {
    last: Option<Connectivity>,
}

impl ConnectivityMonitor {
    /// Create a monitor with no observation yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Record an observation.
    ///
    /// Returns `true` when the host should drain every type: on the first
    /// observation that is online (work may be left from a previous run) and
    /// on every offline-to-online transition.
    pub fn observe(&mut self, state: Connectivity) -> bool {
        let previous = self.last.replace(state);
        state == Connectivity::Online && previous != Some(Connectivity::Online)
    }

    /// Last observed state.
    #[must_use]
    pub const fn state(&self) -> Option<Connectivity> {
        self.last
    }
}

/// Poll `health_path` every `interval` and ask `queue` to drain every type
/// whenever the backend comes back.
///
/// The watcher stops when `stop` is set or the queue can no longer hand the
/// request to a coordinator.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_watcher(
    transport: Arc<dyn Transport>,
    health_path: String,
    interval: Duration,
    queue: OfflineQueue,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, QueueError> {
    let join = thread::Builder::new()
        .name("nexora-connectivity".to_string())
        .spawn(move || {
            let mut monitor = ConnectivityMonitor::new();

            while !stop.load(Ordering::Relaxed) {
                let state = if transport.probe(&health_path) {
                    Connectivity::Online
                } else {
                    Connectivity::Offline
                };

                if monitor.observe(state) {
                    info!("backend reachable, requesting drain of every queue");
                    if !queue.request_drain_all() {
                        debug!("coordinator gone, stopping connectivity watcher");
                        break;
                    }
                }

                thread::sleep(interval);
            }
        })?;

    Ok(join)
}
