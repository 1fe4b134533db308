//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the records and blob directories
//! - Rebuild the history from the records directory
//!
//! # Design Decisions
//! - Fail fast: a storage directory that cannot be created or listed is fatal
//! - Individual bad documents are not (see `storage::records`)

use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::storage::{HistoryCache, RecordStore, StoreError};

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to create storage directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to restore history: {0}")]
    Restore(#[from] StoreError),
}

/// Prepare storage and return the restored history.
pub async fn prepare(
    storage: &StorageConfig,
    records: &dyn RecordStore,
) -> Result<HistoryCache, StartupError> {
    create_dir(Path::new(&storage.records_dir)).await?;
    create_dir(Path::new(&storage.blobs_dir)).await?;

    let restored = records.load_all().await?;
    let history = HistoryCache::from_records(restored);
    tracing::info!(records = history.len(), "History restored");
    Ok(history)
}

async fn create_dir(path: &Path) -> Result<(), StartupError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| StartupError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}
