//! Single-owner fan-out of captured records.
//!
//! The hub task is the only code that touches the subscriber registry.
//! Every interaction (register, deregister, publish, count, close)
//! arrives on one FIFO command channel, so a subscriber registered
//! before a capture receives it and one registered after never does.
//!
//! # Delivery
//! Each subscriber has a bounded buffer fed with `try_send`:
//! - full buffer: the record is dropped for that subscriber only (drop-newest)
//! - closed buffer: the registration is pruned on the spot
//!
//! A stalled subscriber therefore never holds up the dispatch loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::capture::CapturedRequest;
use crate::config::BroadcastConfig;
use crate::observability::metrics;

/// Pre-serialized record, shared by every subscriber it is sent to.
pub type Delivery = Arc<str>;

/// Random token naming one subscriber for the registry's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for hub interactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("broadcast hub is not running")]
    Closed,
}

enum Command {
    Register {
        id: SubscriberId,
        sender: mpsc::Sender<Delivery>,
    },
    Deregister {
        id: SubscriberId,
    },
    Publish(Box<CapturedRequest>),
    Count {
        reply: oneshot::Sender<usize>,
    },
    Close,
}

/// Cloneable front door to the hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
    buffer: usize,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Register { id, .. } => write!(f, "Register({id})"),
            Command::Deregister { id } => write!(f, "Deregister({id})"),
            Command::Publish(record) => write!(f, "Publish({})", record.id),
            Command::Count { .. } => f.write_str("Count"),
            Command::Close => f.write_str("Close"),
        }
    }
}

impl HubHandle {
    /// Add a subscriber and return the receive side of its delivery channel.
    pub fn register(&self, id: SubscriberId) -> Result<mpsc::Receiver<Delivery>, HubError> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.commands
            .send(Command::Register { id, sender })
            .map_err(|_| HubError::Closed)?;
        Ok(receiver)
    }

    /// Remove a subscriber. No-op once the hub has stopped.
    pub fn deregister(&self, id: &SubscriberId) {
        let _ = self.commands.send(Command::Deregister { id: id.clone() });
    }

    /// Queue a record for fan-out. Never blocks.
    pub fn publish(&self, record: CapturedRequest) {
        let id = record.id;
        if self.commands.send(Command::Publish(Box::new(record))).is_err() {
            tracing::warn!(id = %id, "Broadcast hub stopped; record not relayed");
        }
    }

    /// Registry size after every previously queued command has run.
    pub async fn subscriber_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Count { reply })
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Stop the hub after everything queued so far has been dispatched.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// The dispatch loop and the registry it owns.
pub struct BroadcastHub {
    commands: mpsc::UnboundedReceiver<Command>,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Delivery>>,
}

impl BroadcastHub {
    /// Create the hub and a handle to it.
    pub fn new(config: &BroadcastConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            commands: rx,
            subscribers: HashMap::new(),
        };
        let handle = HubHandle {
            commands: tx,
            buffer: config.subscriber_buffer.max(1),
        };
        (hub, handle)
    }

    /// Create the hub and run it on its own task.
    pub fn spawn(config: &BroadcastConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Process commands until `Close` or until every handle is gone.
    ///
    /// Dropping the registry on exit closes every delivery channel,
    /// which ends the attached streams.
    pub async fn run(mut self) {
        tracing::info!("Broadcast hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register { id, sender } => {
                    if self.subscribers.insert(id.clone(), sender).is_some() {
                        tracing::warn!(subscriber = %id, "Subscriber id reused; replacing channel");
                    }
                    tracing::debug!(subscriber = %id, total = self.subscribers.len(), "Subscriber registered");
                    metrics::set_subscribers(self.subscribers.len());
                }
                Command::Deregister { id } => {
                    if self.subscribers.remove(&id).is_some() {
                        tracing::debug!(subscriber = %id, total = self.subscribers.len(), "Subscriber deregistered");
                        metrics::set_subscribers(self.subscribers.len());
                    }
                }
                Command::Publish(record) => self.fan_out(&record),
                Command::Count { reply } => {
                    let _ = reply.send(self.subscribers.len());
                }
                Command::Close => break,
            }
        }

        let remaining = self.subscribers.len();
        self.subscribers.clear();
        metrics::set_subscribers(0);
        tracing::info!(closed_subscribers = remaining, "Broadcast hub stopped");
    }

    fn fan_out(&mut self, record: &CapturedRequest) {
        let delivery: Delivery = match serde_json::to_string(record) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(id = %record.id, error = %e, "Failed to serialize record for broadcast");
                return;
            }
        };

        let before = self.subscribers.len();
        self.subscribers.retain(|id, sender| {
            match sender.try_send(Arc::clone(&delivery)) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, record = %record.id, "Subscriber buffer full; record dropped");
                    metrics::record_delivery_dropped("full");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, "Pruning closed subscriber");
                    false
                }
            }
        });

        if self.subscribers.len() != before {
            metrics::set_subscribers(self.subscribers.len());
        }
        tracing::trace!(id = %record.id, subscribers = self.subscribers.len(), "Record relayed");
    }
}
