//! Queue types and the queued item record.
//!
//! [`QueueType`] is the single definition of the closed set of operation
//! kinds. Producers, the coordinator and the push handler all validate
//! against it, so adding a kind here is the only change needed to route it.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueueError;

/// Prefix of background-sync tags (`sync-<type>`).
pub const SYNC_TAG_PREFIX: &str = "sync-";

/// Operation kinds that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueType {
    /// Create a quote for a work order
    QuoteCreation,
    /// Upload an evidence photo
    EvidenceUpload,
    /// Confirm a customer approval token
    ApprovalConfirmation,
    /// Request a password reset email
    ForgotPassword,
    /// Set a new password from a reset token
    PasswordReset,
    /// Fetch a stamped fiscal document
    DocumentRetrieval,
}

impl QueueType {
    /// Every member of the closed set, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::QuoteCreation,
        Self::EvidenceUpload,
        Self::ApprovalConfirmation,
        Self::ForgotPassword,
        Self::PasswordReset,
        Self::DocumentRetrieval,
    ];

    /// Wire name, used in the store, in sync tags and in endpoint paths.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteCreation => "quote-creation",
            Self::EvidenceUpload => "evidence-upload",
            Self::ApprovalConfirmation => "approval-confirmation",
            Self::ForgotPassword => "forgot-password",
            Self::PasswordReset => "password-reset",
            Self::DocumentRetrieval => "document-retrieval",
        }
    }

    /// Get the display name for this queue type.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::QuoteCreation => "Quote Creation",
            Self::EvidenceUpload => "Evidence Upload",
            Self::ApprovalConfirmation => "Approval Confirmation",
            Self::ForgotPassword => "Forgot Password",
            Self::PasswordReset => "Password Reset",
            Self::DocumentRetrieval => "Document Retrieval",
        }
    }

    /// Endpoint path the payload is POSTed to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("/api/{}", self.as_str())
    }

    /// Background-sync tag registered for this type.
    #[must_use]
    pub fn sync_tag(&self) -> String {
        format!("{SYNC_TAG_PREFIX}{}", self.as_str())
    }

    /// Map a background-sync tag back to its type.
    ///
    /// Returns `None` for tags without the prefix or naming an unknown type.
    #[must_use]
    pub fn from_sync_tag(tag: &str) -> Option<Self> {
        tag.strip_prefix(SYNC_TAG_PREFIX)
            .and_then(|name| name.parse().ok())
    }
}

impl FromStr for QueueType {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| QueueError::UnknownType(s.to_string()))
    }
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued operation with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned ID, `None` until first persisted
    pub id: Option<i64>,
    /// Operation kind
    #[serde(rename = "type")]
    pub queue_type: QueueType,
    /// Request body, opaque to the queue
    pub payload: Value,
    /// Delivery attempts already made
    pub retry: u32,
    /// When the operation was queued
    pub created_at: DateTime<Utc>,
    /// Last failed attempt
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last failure message
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Create a new, not yet persisted item.
    #[must_use]
    pub fn new(queue_type: QueueType, payload: Value) -> Self {
        Self {
            id: None,
            queue_type,
            payload,
            retry: 0,
            created_at: Utc::now(),
            last_attempt: None,
            last_error: None,
        }
    }
}
