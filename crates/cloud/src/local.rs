//! Filesystem-backed blob store.
//!
//! Blob names map to paths under a root directory. Used for on-prem
//! landing zones and for tests.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::BlobError;
use crate::store::{validate_blob_name, BlobEntry, BlobStore};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, BlobError> {
        validate_blob_name(name)?;
        Ok(self.root.join(name))
    }

    async fn entry_for(&self, name: String, path: &Path) -> Result<BlobEntry, BlobError> {
        let meta = tokio::fs::metadata(path).await?;
        let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
        Ok(BlobEntry {
            name,
            size: meta.len(),
            last_modified,
        })
    }
}

fn not_found(name: &str, err: std::io::Error) -> BlobError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BlobError::NotFound(name.to_string())
    } else {
        BlobError::Io(err)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), BlobError> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path).await.map_err(|e| not_found(name, e))
    }

    async fn get_range(&self, name: &str, offset: u64, len: u64) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(name)?;
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found(name, e))?;
        let size = file.metadata().await?.len();
        if offset >= size {
            return Ok(Vec::new());
        }

        let to_read = len.min(size - offset) as usize;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; to_read];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn head(&self, name: &str) -> Result<Option<BlobEntry>, BlobError> {
        let path = self.path_for(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(self.entry_for(name.to_string(), &path).await?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<BlobEntry>, BlobError> {
        let mut entries = Vec::new();
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(entries);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await?;
            while let Some(item) = read_dir.next_entry().await? {
                let path = item.path();
                if item.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if prefix.is_some_and(|p| !name.starts_with(p)) {
                    continue;
                }
                entries.push(self.entry_for(name, &path).await?);
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
