//! Producer call sites.
//!
//! Each user-facing write first tries the backend directly and falls back to
//! the offline queue when the device is offline or the attempt fails. The
//! caller decides what to show the user; this module only reports whether
//! the operation went out or was queued.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{DeliveryError, QueueError};
use crate::queue::{OfflineQueue, QueueItem, QueueType};
use crate::replay::Transport;

/// Why an operation was queued instead of sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueReason {
    /// The device was known to be offline; no attempt was made.
    Offline,
    /// The direct attempt failed.
    Failed(DeliveryError),
}

/// Outcome of a producer write.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Delivered directly.
    Sent,
    /// Persisted for later replay.
    Queued { item: QueueItem, reason: QueueReason },
}

impl Submission {
    /// Whether the operation was deferred to the queue.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// Payload for an evidence photo upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePayload {
    pub work_order_id: String,
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}

/// Payload for approval confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub token: String,
}

/// Payload for a forgot-password request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

/// Payload for a password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordPayload {
    pub token: String,
    pub password: String,
}

/// Payload for fiscal document retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub uuid: String,
}

/// Write actions with offline fallback.
pub struct Producer<'a> {
    queue: &'a OfflineQueue,
    transport: &'a dyn Transport,
}

impl<'a> Producer<'a> {
    /// Create a producer.
    #[must_use]
    pub const fn new(queue: &'a OfflineQueue, transport: &'a dyn Transport) -> Self {
        Self { queue, transport }
    }

    /// Send `payload` directly, or queue it.
    ///
    /// # Errors
    ///
    /// Returns an error only when the operation had to be queued and the
    /// queue could not persist it. The caller then cannot rely on offline
    /// delivery.
    pub fn submit(
        &self,
        queue_type: QueueType,
        payload: Value,
        online: bool,
    ) -> Result<Submission, QueueError> {
        let reason = if online {
            match self.transport.post_json(&queue_type.endpoint(), &payload) {
                Ok(()) => return Ok(Submission::Sent),
                Err(e) => {
                    debug!(queue = %queue_type, error = %e, "direct write failed, queueing");
                    QueueReason::Failed(e)
                },
            }
        } else {
            QueueReason::Offline
        };

        let item = self.queue.enqueue(queue_type, payload)?;
        Ok(Submission::Queued { item, reason })
    }

    /// Create a quote. The quote body is passed through untouched.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn create_quote(&self, quote: Value, online: bool) -> Result<Submission, QueueError> {
        self.submit(QueueType::QuoteCreation, quote, online)
    }

    /// Upload an evidence photo for a work order.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn upload_evidence(
        &self,
        evidence: &EvidencePayload,
        online: bool,
    ) -> Result<Submission, QueueError> {
        self.submit(QueueType::EvidenceUpload, serde_json::to_value(evidence)?, online)
    }

    /// Confirm a customer's quote approval.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn confirm_approval(&self, token: &str, online: bool) -> Result<Submission, QueueError> {
        let payload = ApprovalPayload {
            token: token.to_string(),
        };
        self.submit(
            QueueType::ApprovalConfirmation,
            serde_json::to_value(payload)?,
            online,
        )
    }

    /// Request a password reset email.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn forgot_password(&self, email: &str, online: bool) -> Result<Submission, QueueError> {
        let payload = ForgotPasswordPayload {
            email: email.to_string(),
        };
        self.submit(QueueType::ForgotPassword, serde_json::to_value(payload)?, online)
    }

    /// Set a new password from a reset token.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn reset_password(
        &self,
        token: &str,
        password: &str,
        online: bool,
    ) -> Result<Submission, QueueError> {
        let payload = ResetPasswordPayload {
            token: token.to_string(),
            password: password.to_string(),
        };
        self.submit(QueueType::PasswordReset, serde_json::to_value(payload)?, online)
    }

    /// Retrieve a stamped fiscal document by UUID.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn retrieve_document(&self, uuid: &str, online: bool) -> Result<Submission, QueueError> {
        let payload = DocumentPayload {
            uuid: uuid.to_string(),
        };
        self.submit(QueueType::DocumentRetrieval, serde_json::to_value(payload)?, online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OperationStore;
    use crate::replay::MockTransport;
    use crate::storage::Database;
    use serde_json::json;

    fn create_test_queue() -> OfflineQueue {
        OfflineQueue::with_store(OperationStore::with_database(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_offline_queues_without_network() {
        let queue = create_test_queue();
        let mut transport = MockTransport::new();
        transport.expect_post_json().times(0);

        let producer = Producer::new(&queue, &transport);
        let result = producer.forgot_password("ana@taller.mx", false).unwrap();

        match result {
            Submission::Queued { item, reason } => {
                assert_eq!(reason, QueueReason::Offline);
                assert_eq!(item.payload, json!({"email": "ana@taller.mx"}));
            },
            Submission::Sent => panic!("expected queued"),
        }
        assert_eq!(queue.peek(QueueType::ForgotPassword).unwrap().len(), 1);
    }

    #[test]
    fn test_online_success_is_not_queued() {
        let queue = create_test_queue();
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .withf(|path, body| path == "/api/approval-confirmation" && body["token"] == "tok")
            .times(1)
            .returning(|_, _| Ok(()));

        let producer = Producer::new(&queue, &transport);
        let result = producer.confirm_approval("tok", true).unwrap();

        assert_eq!(result, Submission::Sent);
        assert_eq!(queue.stats().unwrap().pending, 0);
    }

    #[test]
    fn test_failed_attempt_falls_back_to_queue() {
        let queue = create_test_queue();
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .times(1)
            .returning(|_, _| Err(DeliveryError::Status(409)));

        let producer = Producer::new(&queue, &transport);
        let result = producer
            .reset_password("reset-token", "s3cret!", true)
            .unwrap();

        assert!(result.is_queued());
        if let Submission::Queued { reason, .. } = result {
            assert_eq!(reason, QueueReason::Failed(DeliveryError::Status(409)));
        }

        let items = queue.peek(QueueType::PasswordReset).unwrap();
        assert_eq!(items[0].payload["token"], "reset-token");
        assert_eq!(items[0].retry, 0);
    }

    #[test]
    fn test_typed_helpers_use_their_queue() {
        let queue = create_test_queue();
        let transport = MockTransport::new();
        let producer = Producer::new(&queue, &transport);

        producer.create_quote(json!({"total": 1200}), false).unwrap();
        producer
            .upload_evidence(
                &EvidencePayload {
                    work_order_id: "OT-7".to_string(),
                    file_name: "front.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    data: "aGVsbG8=".to_string(),
                },
                false,
            )
            .unwrap();
        producer.retrieve_document("F00D-CAFE", false).unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(
            stats.by_type,
            vec![
                (QueueType::QuoteCreation, 1),
                (QueueType::EvidenceUpload, 1),
                (QueueType::DocumentRetrieval, 1),
            ]
        );
    }
}
