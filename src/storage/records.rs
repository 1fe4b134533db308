//! One JSON document per captured request.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::capture::CapturedRequest;
use crate::storage::{RecordStore, StoreError};

/// Record store backed by a directory of `<id>.json` files.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Deterministic document path for a record.
    pub fn path_for(&self, record: &CapturedRequest) -> PathBuf {
        self.dir.join(format!("{}.json", record.key()))
    }

    async fn read_document(path: &Path) -> Result<CapturedRequest, StoreError> {
        let data = tokio::fs::read(path).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn save(&self, record: &CapturedRequest) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Encode {
            id: record.id,
            source,
        })?;
        let path = self.path_for(record);

        // create_new: an id is written at most once.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(&data).await.map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        file.flush()
            .await
            .map_err(|source| StoreError::Io { path, source })?;

        tracing::trace!(id = %record.id, "Record persisted");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<CapturedRequest>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let mut records = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "Stopped listing records early");
                    break;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                tracing::debug!(path = %path.display(), "Skipping non-record file");
                continue;
            }

            match Self::read_document(&path).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable record");
                }
            }
        }

        tracing::info!(count = records.len(), dir = %self.dir.display(), "Records loaded");
        Ok(records)
    }
}
