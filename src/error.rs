//! Error types for nexora-queue.

use thiserror::Error;

/// Errors surfaced by the queue, its store and the coordinator.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The durable store could not be opened at all.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A query or transaction against an open store failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A queue type outside the closed set was supplied.
    #[error("Unknown queue type: {0}")]
    UnknownType(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A direct network write failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// JSON encoding or decoding failed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single network write did not succeed.
///
/// The replay engine treats every variant identically for retry counting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The request never produced a response (offline, DNS, refused, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("server responded with status {0}")]
    Status(u16),
}

/// Failure to register a background wake-up.
///
/// Always advisory: callers log and discard it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("wake-up registration failed: {0}")]
pub struct WakeError(pub String);

impl QueueError {
    /// Whether the error means the queue cannot guarantee offline durability.
    #[must_use]
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::StorageUnavailable(_) => 3,
            Self::UnknownType(_) | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_display() {
        assert_eq!(
            DeliveryError::Status(503).to_string(),
            "server responded with status 503"
        );
        assert!(DeliveryError::Transport("connection refused".to_string())
            .to_string()
            .contains("connection refused"));
    }

    #[test]
    fn test_delivery_converts_into_queue_error() {
        let err: QueueError = DeliveryError::Status(500).into();
        assert!(matches!(err, QueueError::Delivery(DeliveryError::Status(500))));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(QueueError::StorageUnavailable("denied".into()).exit_code(), 3);
        assert_eq!(QueueError::UnknownType("bogus".into()).exit_code(), 2);
        assert_eq!(QueueError::Database("locked".into()).exit_code(), 1);
        assert!(QueueError::StorageUnavailable("x".into()).is_storage_unavailable());
    }
}
