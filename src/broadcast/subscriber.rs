//! Per-connection subscription state machine.
//!
//! # States
//! ```text
//! Connecting ──register ok──▶ Streaming ──channel closed / shutdown / drop──▶ Closed
//!     └──────register failed (hub not running)──▶ error, nothing registered
//! ```
//!
//! Deregistration happens on every path into `Closed`, including the
//! connection simply going away and the stream being dropped.

use tokio::sync::mpsc;

use crate::broadcast::hub::{Delivery, HubError, HubHandle, SubscriberId};
use crate::lifecycle::ShutdownSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Streaming,
    Closed,
}

/// A registered live-stream subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    hub: HubHandle,
    receiver: mpsc::Receiver<Delivery>,
    state: SubscriptionState,
}

impl Subscription {
    /// Register a new subscriber with the hub.
    pub fn open(hub: &HubHandle) -> Result<Self, HubError> {
        let id = SubscriberId::random();
        let receiver = hub.register(id.clone())?;
        tracing::info!(subscriber = %id, "Subscriber connected");
        Ok(Self {
            id,
            hub: hub.clone(),
            receiver,
            state: SubscriptionState::Streaming,
        })
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Wait for the next relayed record.
    ///
    /// Returns `None` once the subscription is closed, either because
    /// the hub dropped the channel or because shutdown was signalled.
    pub async fn next(&mut self, shutdown: &mut ShutdownSignal) -> Option<Delivery> {
        if self.state == SubscriptionState::Closed {
            return None;
        }

        tokio::select! {
            delivery = self.receiver.recv() => match delivery {
                Some(delivery) => Some(delivery),
                None => {
                    self.close("channel closed");
                    None
                }
            },
            _ = shutdown.recv() => {
                self.close("shutdown");
                None
            }
        }
    }

    fn close(&mut self, reason: &'static str) {
        if self.state == SubscriptionState::Closed {
            return;
        }
        self.state = SubscriptionState::Closed;
        self.hub.deregister(&self.id);
        self.receiver.close();
        tracing::info!(subscriber = %self.id, reason, "Subscriber disconnected");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close("connection dropped");
    }
}
