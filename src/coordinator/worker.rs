//! The background coordinator.
//!
//! A coordinator runs on its own thread and is reachable only through a
//! [`CoordinatorHandle`] (an mpsc sender) and the shared store file. It holds
//! no queue state between triggers: every trigger reopens the store, so the
//! worker can be torn down and restarted at any point without losing work.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::sink::TriggerSink;
use super::trigger::{Resolution, Trigger};
use crate::error::{QueueError, WakeError};
use crate::queue::{OperationStore, QueueType};
use crate::replay::{DrainReport, ReplayEngine, RetryPolicy, Transport};

/// Invokes drain passes in response to triggers.
pub struct Coordinator {
    db_path: PathBuf,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    sink: Option<Arc<dyn TriggerSink>>,
}

impl Coordinator {
    /// Create a coordinator over the store at `db_path`.
    #[must_use]
    pub fn new(db_path: &Path, transport: Arc<dyn Transport>) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
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

    /// Where scheduled retries are sent. [`Self::spawn`] points this at the
    /// worker's own channel.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TriggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handle one trigger and return the drain reports it produced.
    ///
    /// Triggers that do not resolve to a known type return an empty list
    /// without opening the store or touching the network. A drain that fails
    /// for one type is logged and does not prevent the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn handle(&self, trigger: &Trigger) -> Result<Vec<DrainReport>, QueueError> {
        let types = match trigger.resolve() {
            Resolution::Drain(types) => types,
            Resolution::Ignore(reason) => {
                debug!(%reason, "ignoring trigger");
                return Ok(Vec::new());
            },
            Resolution::Stop => return Ok(Vec::new()),
        };

        let store = OperationStore::open_at(&self.db_path)?;
        let mut engine =
            ReplayEngine::new(&store, self.transport.as_ref()).with_policy(self.policy);
        if let Some(sink) = self.sink.as_deref() {
            engine = engine.with_sink(sink);
        }

        let mut reports = Vec::with_capacity(types.len());
        for queue_type in types {
            match engine.drain(queue_type) {
                Ok(report) => reports.push(report),
                Err(e) => warn!(queue = %queue_type, error = %e, "drain pass failed"),
            }
        }

        Ok(reports)
    }

    /// Start the coordinator on a dedicated thread.
    ///
    /// The returned handle is the only way to reach it. The worker keeps a
    /// handle of its own to schedule retries, so its channel never closes:
    /// dropping every returned handle does not stop it. Hosts must call
    /// [`CoordinatorHandle::shutdown`] to end the thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(mut self) -> Result<(CoordinatorHandle, JoinHandle<()>), QueueError> {
        let (tx, rx) = mpsc::channel();
        let handle = CoordinatorHandle::new(tx);

        // Retries scheduled by the engine come back through our own channel
        self.sink = Some(Arc::new(handle.clone()));

        let join = thread::Builder::new()
            .name("nexora-coordinator".to_string())
            .spawn(move || self.run(&rx))?;

        Ok((handle, join))
    }

    fn run(&self, rx: &Receiver<Trigger>) {
        info!(db = %self.db_path.display(), "coordinator started");

        for trigger in rx {
            if trigger == Trigger::Shutdown {
                break;
            }
            if let Err(e) = self.handle(&trigger) {
                warn!(?trigger, error = %e, "trigger failed");
            }
        }

        info!("coordinator stopped");
    }
}

/// Sending side of a running coordinator.
///
/// Delayed sync wake-ups are merged per tag: at most one is pending for a
/// tag, and it fires at the earliest requested deadline.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: Sender<Trigger>,
    pending: Arc<Mutex<HashMap<String, Instant>>>,
}

impl CoordinatorHandle {
    fn new(tx: Sender<Trigger>) -> Self {
        Self {
            tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Post an explicit "process this type now" message.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator has stopped.
    pub fn process(&self, queue_type: QueueType) -> Result<(), WakeError> {
        self.send(Trigger::message_for(queue_type))
    }

    /// Forward a push notification body.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator has stopped.
    pub fn push(&self, body: &str) -> Result<(), WakeError> {
        self.send(Trigger::Push {
            body: body.to_string(),
        })
    }

    /// Ask for every type to be drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator has stopped.
    pub fn drain_all(&self) -> Result<(), WakeError> {
        self.send(Trigger::DrainAll)
    }

    /// Stop the worker after the trigger currently in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator has already stopped.
    pub fn shutdown(&self) -> Result<(), WakeError> {
        self.send(Trigger::Shutdown)
    }
}

impl TriggerSink for CoordinatorHandle {
    fn send(&self, trigger: Trigger) -> Result<(), WakeError> {
        self.tx
            .send(trigger)
            .map_err(|_| WakeError("coordinator is not running".to_string()))
    }

    fn send_after(&self, trigger: Trigger, delay: Duration) -> Result<(), WakeError> {
        let deadline = Instant::now() + delay;

        let merge_key = match &trigger {
            Trigger::Sync { tag } => {
                let mut pending = self
                    .pending
                    .lock()
                    .map_err(|_| WakeError("wake-up table poisoned".to_string()))?;
                if pending.get(tag).is_some_and(|due| *due <= deadline) {
                    debug!(%tag, "wake-up already pending, merging");
                    return Ok(());
                }
                pending.insert(tag.clone(), deadline);
                Some(tag.clone())
            },
            _ => None,
        };

        let tx = self.tx.clone();
        let pending = Arc::clone(&self.pending);
        let timer_key = merge_key.clone();
        let spawned = thread::Builder::new()
            .name("nexora-wakeup".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if let Some(tag) = timer_key {
                    let Ok(mut pending) = pending.lock() else {
                        return;
                    };
                    // Superseded by an earlier deadline that already fired
                    if pending.get(&tag) != Some(&deadline) {
                        return;
                    }
                    pending.remove(&tag);
                }
                // The worker may be gone by now; the item stays in the store
                let _ = tx.send(trigger);
            });

        if let Err(e) = spawned {
            if let (Some(tag), Ok(mut pending)) = (merge_key, self.pending.lock()) {
                pending.remove(&tag);
            }
            return Err(WakeError(format!("failed to start timer: {e}")));
        }

        Ok(())
    }
}
