//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! startup:  records dir → records.rs (load_all) → history.rs (sort, newest first)
//! capture:  CapturedRequest → records.rs (save <id>.json)
//!                           → history.rs (insert at head)
//! ```
//!
//! # Design Decisions
//! - The records directory is the only source of truth across restarts
//! - History is rebuilt once at startup and only grows afterwards
//! - Individual unreadable documents never abort a bulk load

pub mod history;
pub mod records;

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::capture::CapturedRequest;

pub use history::HistoryCache;
pub use records::FsRecordStore;

/// Error type for record and blob storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode record {id}: {source}")]
    Encode {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed record document {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable home of captured records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record under its id.
    async fn save(&self, record: &CapturedRequest) -> Result<(), StoreError>;

    /// Every persisted record, in no particular order.
    ///
    /// Fails only if the store itself cannot be listed; unreadable
    /// documents are skipped.
    async fn load_all(&self) -> Result<Vec<CapturedRequest>, StoreError>;
}
