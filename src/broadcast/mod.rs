//! Live fan-out subsystem.
//!
//! # Data Flow
//! ```text
//! capture pipeline ──publish──▶ hub.rs (one task, owns registry)
//!                                   │ try_send, per subscriber
//!                                   ▼
//!                        subscriber.rs (one per /sse connection)
//!                                   │
//!                                   ▼
//!                        event: message / data: <json>
//! ```
//!
//! # Design Decisions
//! - Registry mutated only by the hub task; no locks on the hot path
//! - Records serialized once per publish, shared as `Arc<str>`
//! - Lossy per subscriber (drop-newest), ordered, no replay

pub mod hub;
pub mod subscriber;

pub use hub::{BroadcastHub, Delivery, HubError, HubHandle, SubscriberId};
pub use subscriber::{Subscription, SubscriptionState};
