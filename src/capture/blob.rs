//! Auxiliary storage for bodies that could not be split into parameters.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::storage::StoreError;

/// Write-side of the blob directory.
///
/// Retrieval happens through the static file service mounted on the
/// same directory, so the trait only needs to write.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`.
    async fn write_blob(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Blob store backed by a plain directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write_blob(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }
}

/// Extension (with leading dot) for a declared content type.
///
/// Parameters such as `; charset=utf-8` are ignored. Returns `None`
/// when the type is unknown or malformed.
pub fn extension_for(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }
    let extensions = mime_guess::get_mime_extensions_str(&essence)?;
    let preferred = preferred_extension(&essence, extensions)?;
    Some(format!(".{preferred}"))
}

// mime_guess lists extensions alphabetically; a few types have a
// well-known primary extension that should win.
fn preferred_extension(essence: &str, extensions: &[&'static str]) -> Option<&'static str> {
    let primary = match essence {
        "image/jpeg" => Some("jpg"),
        "text/plain" => Some("txt"),
        "text/html" => Some("html"),
        "application/octet-stream" => Some("bin"),
        _ => None,
    };
    primary
        .and_then(|p| extensions.iter().copied().find(|e| *e == p))
        .or_else(|| extensions.first().copied())
}
