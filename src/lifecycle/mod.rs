//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Create storage dirs → Restore history → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → End open streams
//!         → Close hub (drains queued records) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then storage, then listeners
//! - The hub closes only after both listeners stopped producing captures

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{prepare, StartupError};
