//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → normalizer.rs (record + optional blob via blob.rs)
//!     → pipeline.rs
//!         → history (insert at head)
//!         → broadcast hub (publish)
//!         → record store (save <id>.json)
//! ```
//!
//! # Design Decisions
//! - Capture never fails the inbound request; every sub-failure degrades the record
//! - One id generator (UUID v4) for record ids and blob names

pub mod blob;
pub mod model;
pub mod normalizer;
pub mod pipeline;

pub use blob::{BlobStore, FsBlobStore};
pub use model::CapturedRequest;
pub use normalizer::RequestNormalizer;
pub use pipeline::CapturePipeline;
