//! Best-effort delivery of triggers to the coordinator.
//!
//! A [`TriggerSink`] is the background-registration capability: enqueue uses
//! it to register a wake-up, the replay engine uses it to schedule a retry.
//! Neither depends on it firing; durability comes from the store. Call sites
//! go through [`notify`] and [`notify_after`], which log and drop failures.

use std::time::Duration;

use tracing::debug;

use super::trigger::Trigger;
use crate::error::WakeError;

/// Something that can wake the coordinator.
#[cfg_attr(test, mockall::automock)]
pub trait TriggerSink: Send + Sync {
    /// Deliver a trigger as soon as possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached.
    fn send(&self, trigger: Trigger) -> Result<(), WakeError>;

    /// Deliver a trigger no earlier than `delay` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the wake-up cannot be scheduled.
    fn send_after(&self, trigger: Trigger, delay: Duration) -> Result<(), WakeError>;
}

/// Send a trigger if a sink is available. Returns whether it was handed off.
pub fn notify(sink: Option<&dyn TriggerSink>, trigger: Trigger) -> bool {
    let Some(sink) = sink else {
        debug!(?trigger, "no background sync available, skipping wake-up");
        return false;
    };

    match sink.send(trigger) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "wake-up registration failed, ignoring");
            false
        },
    }
}

/// Schedule a delayed trigger if a sink is available.
pub fn notify_after(sink: Option<&dyn TriggerSink>, trigger: Trigger, delay: Duration) -> bool {
    let Some(sink) = sink else {
        return false;
    };

    match sink.send_after(trigger, delay) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "delayed wake-up registration failed, ignoring");
            false
        },
    }
}
