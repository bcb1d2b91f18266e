//! Drain pass over one queue type.
//!
//! A pass works on the snapshot it reads at its start. Each item resolves to
//! delivered, retrying or evicted on its own; a failure on one item never
//! stops the rest of the pass.

use std::time::Duration;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use super::backoff::{Decision, RetryPolicy};
use super::transport::Transport;
use crate::coordinator::{notify_after, Trigger, TriggerSink};
use crate::error::QueueError;
use crate::queue::{OperationStore, QueueItem, QueueType};

/// How a single item ended up after an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Delivered. `removed` is false if a concurrent pass deleted it first.
    Delivered { removed: bool },
    /// Failed; retry count persisted.
    Retrying {
        attempt: u32,
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// Failed for the last time and dropped. `removed` is false if a
    /// concurrent pass deleted it first.
    Evicted { attempt: u32, removed: bool },
    /// The store rejected the follow-up write; the item is left as it was.
    StoreFailed,
}

/// Result of processing one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    /// Item ID
    pub id: i64,
    /// What happened
    #[serde(flatten)]
    pub outcome: ItemOutcome,
    /// Delivery or store error message, if any
    pub error: Option<String>,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    /// Drained type
    #[serde(rename = "type")]
    pub queue_type: QueueType,
    /// Items delivered
    pub delivered: usize,
    /// Items kept for another attempt
    pub retried: usize,
    /// Items dropped after exhausting retries
    pub evicted: usize,
    /// Items whose store update failed
    pub faulted: usize,
    /// Individual results
    pub results: Vec<ItemResult>,
}

impl DrainReport {
    /// Create an empty report.
    #[must_use]
    pub const fn empty(queue_type: QueueType) -> Self {
        Self {
            queue_type,
            delivered: 0,
            retried: 0,
            evicted: 0,
            faulted: 0,
            results: Vec::new(),
        }
    }

    /// Add a result.
    pub fn add(&mut self, result: ItemResult) {
        match result.outcome {
            ItemOutcome::Delivered { .. } => self.delivered += 1,
            ItemOutcome::Retrying { .. } => self.retried += 1,
            ItemOutcome::Evicted { .. } => self.evicted += 1,
            ItemOutcome::StoreFailed => self.faulted += 1,
        }
        self.results.push(result);
    }

    /// Get total items processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.delivered + self.retried + self.evicted + self.faulted
    }

    /// Shortest backoff among the items kept for retry.
    #[must_use]
    pub fn next_retry(&self) -> Option<Duration> {
        self.results
            .iter()
            .filter_map(|r| match r.outcome {
                ItemOutcome::Retrying { delay, .. } => Some(delay),
                _ => None,
            })
            .min()
    }

    /// Number of items this pass actually removed after delivery.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Delivered { removed: true }))
            .count()
    }
}

/// Replays queued items of one type against the network.
pub struct ReplayEngine<'a> {
    store: &'a OperationStore,
    transport: &'a dyn Transport,
    policy: RetryPolicy,
    sink: Option<&'a dyn TriggerSink>,
}

impl<'a> ReplayEngine<'a> {
    /// Create an engine with the default policy and no background sync.
    #[must_use]
    pub fn new(store: &'a OperationStore, transport: &'a dyn Transport) -> Self {
        Self {
            store,
            transport,
            policy: RetryPolicy::default(),
            sink: None,
        }
    }

    /// Use a custom retry policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Schedule retries through a background-sync capability.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn TriggerSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attempt delivery of every pending item of `queue_type`.
    ///
    /// At most one wake-up is scheduled per pass, after the shortest backoff
    /// among the items kept for retry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pending items cannot be read. Per-item
    /// store failures are logged and reported as
    /// [`ItemOutcome::StoreFailed`].
    pub fn drain(&self, queue_type: QueueType) -> Result<DrainReport, QueueError> {
        let pending = self.store.read_all_by_type(queue_type)?;
        let mut report = DrainReport::empty(queue_type);

        for item in &pending {
            let Some(id) = item.id else {
                continue;
            };
            report.add(self.replay_one(id, item));
        }

        if let Some(delay) = report.next_retry() {
            notify_after(self.sink, Trigger::sync_for(queue_type), delay);
        }

        if report.total() > 0 {
            info!(
                queue = %queue_type,
                delivered = report.delivered,
                retried = report.retried,
                evicted = report.evicted,
                faulted = report.faulted,
                "drain pass finished"
            );
        }

        Ok(report)
    }

    fn replay_one(&self, id: i64, item: &QueueItem) -> ItemResult {
        let queue_type = item.queue_type;

        let delivery = self
            .transport
            .post_json(&queue_type.endpoint(), &item.payload);

        let error = match delivery {
            Ok(()) => {
                return match self.store.delete(id) {
                    Ok(removed) => ItemResult {
                        id,
                        outcome: ItemOutcome::Delivered { removed },
                        error: None,
                    },
                    Err(e) => self.store_failed(id, queue_type, &e),
                };
            },
            Err(e) => e.to_string(),
        };

        match self.policy.decide(item.retry) {
            Decision::Retry { attempt, delay } => {
                if let Err(e) = self.store.update_retry(id, attempt, Some(&error)) {
                    return self.store_failed(id, queue_type, &e);
                }

                ItemResult {
                    id,
                    outcome: ItemOutcome::Retrying { attempt, delay },
                    error: Some(error),
                }
            },
            Decision::Evict { attempt } => {
                let removed = match self.store.delete(id) {
                    Ok(removed) => removed,
                    Err(e) => return self.store_failed(id, queue_type, &e),
                };
                warn!(
                    id,
                    queue = %queue_type,
                    attempt,
                    error = %error,
                    "evicting operation after exhausting retries"
                );

                ItemResult {
                    id,
                    outcome: ItemOutcome::Evicted { attempt, removed },
                    error: Some(error),
                }
            },
        }
    }

    fn store_failed(&self, id: i64, queue_type: QueueType, e: &QueueError) -> ItemResult {
        warn!(id, queue = %queue_type, error = %e, "store update failed during drain");
        ItemResult {
            id,
            outcome: ItemOutcome::StoreFailed,
            error: Some(e.to_string()),
        }
    }
}

/// Format a drain report for display.
#[must_use]
pub fn format_drain_report(report: &DrainReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Drained {}: {} operations",
        report.queue_type,
        report.total()
    ));
    lines.push("─".repeat(40));

    if report.delivered > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} delivered", report.delivered).green()
        ));
    }

    if report.retried > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} will retry", report.retried).yellow()
        ));
    }

    if report.evicted > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} evicted", report.evicted).red()
        ));
    }

    if report.faulted > 0 {
        lines.push(format!(
            "  {} {}",
            "!".red(),
            format!("{} store errors", report.faulted).red()
        ));
    }

    let errors: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.error.is_some())
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for err in errors {
            lines.push(format!(
                "  - #{}: {}",
                err.id,
                err.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(delay.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::MockTriggerSink;
    use crate::error::{DeliveryError, WakeError};
    use crate::replay::MockTransport;
    use crate::storage::Database;
    use serde_json::{json, Value};

    fn create_test_store() -> OperationStore {
        OperationStore::with_database(Database::open_in_memory().unwrap())
    }

    fn enqueue(store: &OperationStore, queue_type: QueueType, payload: Value) -> i64 {
        let mut item = QueueItem::new(queue_type, payload);
        store.insert(&mut item).unwrap()
    }

    fn always_ok() -> MockTransport {
        let mut transport = MockTransport::new();
        transport.expect_post_json().returning(|_, _| Ok(()));
        transport
    }

    fn always_failing() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .returning(|_, _| Err(DeliveryError::Transport("offline".to_string())));
        transport
    }

    #[test]
    fn test_successful_drain_clears_queue() {
        let store = create_test_store();
        enqueue(&store, QueueType::QuoteCreation, json!({"id": 2}));

        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .withf(|path, body| path == "/api/quote-creation" && *body == json!({"id": 2}))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = ReplayEngine::new(&store, &transport)
            .drain(QueueType::QuoteCreation)
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.removed(), 1);
        assert!(store
            .read_all_by_type(QueueType::QuoteCreation)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_failure_then_success() {
        let store = create_test_store();
        enqueue(&store, QueueType::QuoteCreation, json!({"id": 3}));

        let mut calls = 0;
        let mut transport = MockTransport::new();
        transport.expect_post_json().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(DeliveryError::Transport("offline".to_string()))
            } else {
                Ok(())
            }
        });

        let engine = ReplayEngine::new(&store, &transport);

        let first = engine.drain(QueueType::QuoteCreation).unwrap();
        assert_eq!(first.retried, 1);
        let items = store.read_all_by_type(QueueType::QuoteCreation).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].retry, 1);
        assert_eq!(items[0].payload, json!({"id": 3}));
        assert!(items[0].last_error.is_some());

        let second = engine.drain(QueueType::QuoteCreation).unwrap();
        assert_eq!(second.delivered, 1);
        assert!(store
            .read_all_by_type(QueueType::QuoteCreation)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_success_status_counts_as_failure() {
        let store = create_test_store();
        enqueue(&store, QueueType::ApprovalConfirmation, json!({"token": "t"}));

        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .returning(|_, _| Err(DeliveryError::Status(503)));

        let report = ReplayEngine::new(&store, &transport)
            .drain(QueueType::ApprovalConfirmation)
            .unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(
            report.results[0].error.as_deref(),
            Some("server responded with status 503")
        );
    }

    #[test]
    fn test_terminal_eviction_after_five_attempts() {
        let store = create_test_store();
        enqueue(&store, QueueType::EvidenceUpload, json!({"photo": "x.jpg"}));

        let transport = always_failing();

        let mut sink = MockTriggerSink::new();
        sink.expect_send_after()
            .withf(|t, _| *t == Trigger::sync_for(QueueType::EvidenceUpload))
            .times(4)
            .returning(|_, _| Ok(()));

        let engine = ReplayEngine::new(&store, &transport).with_sink(&sink);

        for expected_retry in 1..=4 {
            let report = engine.drain(QueueType::EvidenceUpload).unwrap();
            assert_eq!(report.retried, 1);
            let items = store.read_all_by_type(QueueType::EvidenceUpload).unwrap();
            assert_eq!(items[0].retry, expected_retry);
        }

        let last = engine.drain(QueueType::EvidenceUpload).unwrap();
        assert_eq!(last.evicted, 1);
        assert_eq!(
            last.results[0].outcome,
            ItemOutcome::Evicted {
                attempt: 5,
                removed: true
            }
        );
        assert!(store
            .read_all_by_type(QueueType::EvidenceUpload)
            .unwrap()
            .is_empty());

        // Nothing left to attempt
        let after = engine.drain(QueueType::EvidenceUpload).unwrap();
        assert_eq!(after.total(), 0);
    }

    #[test]
    fn test_retry_schedules_backoff_delays() {
        let store = create_test_store();
        enqueue(&store, QueueType::PasswordReset, json!({}));

        let transport = always_failing();
        let engine = ReplayEngine::new(&store, &transport);

        let delays: Vec<_> = (0..4)
            .map(|_| {
                let report = engine.drain(QueueType::PasswordReset).unwrap();
                match report.results[0].outcome {
                    ItemOutcome::Retrying { delay, .. } => delay,
                    ref other => panic!("unexpected outcome {other:?}"),
                }
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn test_type_isolation() {
        let store = create_test_store();
        enqueue(&store, QueueType::QuoteCreation, json!({"q": 1}));
        enqueue(&store, QueueType::EvidenceUpload, json!({"e": 1}));
        enqueue(&store, QueueType::EvidenceUpload, json!({"e": 2}));

        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .withf(|path, _| path == "/api/quote-creation")
            .returning(|_, _| Err(DeliveryError::Status(500)));

        let engine = ReplayEngine::new(&store, &transport).with_policy(RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        });
        let report = engine.drain(QueueType::QuoteCreation).unwrap();
        assert_eq!(report.evicted, 1);

        let evidence = store.read_all_by_type(QueueType::EvidenceUpload).unwrap();
        assert_eq!(evidence.len(), 2);
        assert!(evidence.iter().all(|i| i.retry == 0 && i.last_error.is_none()));
    }

    #[test]
    fn test_one_failure_does_not_block_others() {
        let store = create_test_store();
        enqueue(&store, QueueType::QuoteCreation, json!({"n": 1}));
        enqueue(&store, QueueType::QuoteCreation, json!({"n": 2}));
        enqueue(&store, QueueType::QuoteCreation, json!({"n": 3}));

        let mut transport = MockTransport::new();
        transport.expect_post_json().times(3).returning(|_, body| {
            if body["n"] == 2 {
                Err(DeliveryError::Status(502))
            } else {
                Ok(())
            }
        });

        let report = ReplayEngine::new(&store, &transport)
            .drain(QueueType::QuoteCreation)
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.retried, 1);

        let left = store.read_all_by_type(QueueType::QuoteCreation).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].payload, json!({"n": 2}));
    }

    #[test]
    fn test_items_attempted_in_insertion_order() {
        let store = create_test_store();
        for n in 0..4 {
            enqueue(&store, QueueType::ForgotPassword, json!({ "n": n }));
        }

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = std::sync::Arc::clone(&seen);
        let mut transport = MockTransport::new();
        transport.expect_post_json().returning(move |_, body| {
            recorder.lock().unwrap().push(body["n"].as_i64().unwrap());
            Ok(())
        });

        ReplayEngine::new(&store, &transport)
            .drain(QueueType::ForgotPassword)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_queue_makes_no_requests() {
        let store = create_test_store();
        let mut transport = MockTransport::new();
        transport.expect_post_json().times(0);

        let report = ReplayEngine::new(&store, &transport)
            .drain(QueueType::DocumentRetrieval)
            .unwrap();
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_report_formatting() {
        let store = create_test_store();
        enqueue(&store, QueueType::QuoteCreation, json!({}));

        let transport = always_ok();
        let report = ReplayEngine::new(&store, &transport)
            .drain(QueueType::QuoteCreation)
            .unwrap();

        let text = format_drain_report(&report);
        assert!(text.contains("quote-creation"));
        assert!(text.contains("1 delivered"));
    }

    #[test]
    fn test_one_wakeup_per_pass_at_shortest_delay() {
        let store = create_test_store();
        let older = enqueue(&store, QueueType::QuoteCreation, json!({"n": 1}));
        enqueue(&store, QueueType::QuoteCreation, json!({"n": 2}));
        enqueue(&store, QueueType::QuoteCreation, json!({"n": 3}));
        store.update_retry(older, 2, Some("offline")).unwrap();

        let transport = always_failing();
        let mut sink = MockTriggerSink::new();
        sink.expect_send_after()
            .withf(|t, delay| {
                *t == Trigger::sync_for(QueueType::QuoteCreation)
                    && *delay == Duration::from_secs(1)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let report = ReplayEngine::new(&store, &transport)
            .with_sink(&sink)
            .drain(QueueType::QuoteCreation)
            .unwrap();

        assert_eq!(report.retried, 3);
        assert_eq!(report.next_retry(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_failed_wakeup_still_persists_retry() {
        let store = create_test_store();
        enqueue(&store, QueueType::DocumentRetrieval, json!({"uuid": "F00D"}));

        let transport = always_failing();
        let mut sink = MockTriggerSink::new();
        sink.expect_send_after()
            .times(1)
            .returning(|_, _| Err(WakeError("coordinator is not running".to_string())));

        let report = ReplayEngine::new(&store, &transport)
            .with_sink(&sink)
            .drain(QueueType::DocumentRetrieval)
            .unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(
            report.results[0].outcome,
            ItemOutcome::Retrying {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        let items = store.read_all_by_type(QueueType::DocumentRetrieval).unwrap();
        assert_eq!(items[0].retry, 1);
        assert_eq!(items[0].payload, json!({"uuid": "F00D"}));
    }

    #[test]
    fn test_eviction_of_already_removed_item() {
        let store = create_test_store();
        let id = enqueue(&store, QueueType::PasswordReset, json!({}));
        let item = store.get(id).unwrap().unwrap();

        // A concurrent pass removed the row after this one read its snapshot
        store.delete(id).unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .returning(|_, _| Err(DeliveryError::Status(500)));

        let engine = ReplayEngine::new(&store, &transport).with_policy(RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        });
        let result = engine.replay_one(id, &item);

        assert_eq!(
            result.outcome,
            ItemOutcome::Evicted {
                attempt: 1,
                removed: false
            }
        );
    }
}
