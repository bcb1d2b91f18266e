//! Messages that wake the coordinator and how they map to drain passes.
//!
//! Trigger fields are plain strings because they arrive from outside the
//! process (platform sync tags, posted messages, push bodies). Nothing is
//! drained until [`Trigger::resolve`] has checked them against the closed
//! set of [`QueueType`]s.

use serde::{Deserialize, Serialize};

use crate::queue::QueueType;

/// An event delivered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Connectivity regained for a registered `sync-<type>` tag.
    Sync { tag: String },
    /// Explicit "process this type now" request.
    Message { queue: String },
    /// Push notification with a raw JSON body.
    Push { body: String },
    /// Foreground went from offline to online; drain every type.
    DrainAll,
    /// Stop the worker loop.
    Shutdown,
}

/// What the coordinator should do with a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Run one drain pass per listed type.
    Drain(Vec<QueueType>),
    /// Do nothing; the reason is only logged.
    Ignore(String),
    /// Leave the worker loop.
    Stop,
}

/// Body of a push notification. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "type")]
    queue_type: String,
}

impl Trigger {
    /// Sync trigger for a known type.
    #[must_use]
    pub fn sync_for(queue_type: QueueType) -> Self {
        Self::Sync {
            tag: queue_type.sync_tag(),
        }
    }

    /// Explicit process request for a known type.
    #[must_use]
    pub fn message_for(queue_type: QueueType) -> Self {
        Self::Message {
            queue: queue_type.as_str().to_string(),
        }
    }

    /// Validate the trigger and decide which types to drain.
    #[must_use]
    pub fn resolve(&self) -> Resolution {
        match self {
            Self::Sync { tag } => QueueType::from_sync_tag(tag).map_or_else(
                || Resolution::Ignore(format!("unrecognised sync tag {tag:?}")),
                |t| Resolution::Drain(vec![t]),
            ),
            Self::Message { queue } => queue.parse::<QueueType>().map_or_else(
                |_| Resolution::Ignore(format!("message names unknown queue {queue:?}")),
                |t| Resolution::Drain(vec![t]),
            ),
            Self::Push { body } => parse_push(body).map_or_else(
                || Resolution::Ignore("push payload without a recognised type".to_string()),
                |t| Resolution::Drain(vec![t]),
            ),
            Self::DrainAll => Resolution::Drain(QueueType::ALL.to_vec()),
            Self::Shutdown => Resolution::Stop,
        }
    }
}

/// Extract the queue type named by a push body, if any.
#[must_use]
pub fn parse_push(body: &str) -> Option<QueueType> {
    let payload: PushPayload = serde_json::from_str(body).ok()?;
    payload.queue_type.parse().ok()
}
