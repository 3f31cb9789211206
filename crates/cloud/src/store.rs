//! Blob-store abstraction shared by every backend.

use std::path::{Component, Path};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BlobError;

/// Listing entry / properties of a single blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    #[serde(rename = "file_name")]
    pub name: String,
    #[serde(rename = "size_in_bytes")]
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A flat key → bytes store.
///
/// Keys use `/` as a separator. Writes always overwrite.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend label for logs (`"local"`, `"s3"`).
    fn backend(&self) -> &'static str;

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), BlobError>;

    async fn get(&self, name: &str) -> Result<Vec<u8>, BlobError>;

    /// Read `len` bytes starting at `offset`. Reads past the end are
    /// truncated.
    async fn get_range(&self, name: &str, offset: u64, len: u64) -> Result<Vec<u8>, BlobError>;

    /// Properties of a blob, or `None` when it does not exist.
    async fn head(&self, name: &str) -> Result<Option<BlobEntry>, BlobError>;

    /// Blobs whose name starts with `prefix` (all blobs for `None`),
    /// sorted by name.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<BlobEntry>, BlobError>;

    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        Ok(self.head(name).await?.is_some())
    }
}

/// Reject empty names and names that could escape a directory root.
pub fn validate_blob_name(name: &str) -> Result<(), BlobError> {
    if name.trim().is_empty() {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    let escapes = Path::new(name).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Last path segment of a blob name (`"a/b/c.pdf"` → `"c.pdf"`).
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').find(|s| !s.is_empty()).unwrap_or(name)
}
