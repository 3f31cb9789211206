//! Download and upload helpers layered over [`BlobStore`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::BlobError;
use crate::store::{base_name, validate_blob_name, BlobStore};

/// 100 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Result of [`chunked_download`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkedDownload {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub chunks: usize,
}

/// One blob fetched by [`download_folder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderFile {
    pub name: String,
    pub content: String,
}

/// Result of [`upload_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedBlob {
    pub blob_name: String,
    pub size: u64,
}

/// Download `key` in byte ranges of `chunk_size`, writing each range to a
/// part file in `dest_dir`, then merge the parts into `<name>_merged` and
/// remove them.
///
/// Part files and the in-progress merge carry a per-download id, so
/// concurrent downloads of the same key never share intermediate files.
/// The finished file is renamed into place; on failure nothing is left
/// behind in `dest_dir`.
pub async fn chunked_download(
    store: &dyn BlobStore,
    key: &str,
    dest_dir: &Path,
    chunk_size: u64,
) -> Result<ChunkedDownload, BlobError> {
    if chunk_size == 0 {
        return Err(BlobError::InvalidRequest(
            "chunk size must be greater than zero".into(),
        ));
    }
    let entry = store
        .head(key)
        .await?
        .ok_or_else(|| BlobError::NotFound(key.to_string()))?;

    tokio::fs::create_dir_all(dest_dir).await?;
    let base = base_name(key);
    let run_id = Uuid::new_v4().simple().to_string();

    let job = ChunkJob {
        store,
        key,
        total: entry.size,
        dest_dir,
        base,
        run_id: &run_id,
        chunk_size,
    };
    let mut staged = StagedFiles::default();
    let result = job.fetch_and_merge(&mut staged).await;
    if result.is_err() {
        staged.remove_all().await;
    }
    let (merged, size, sha256, chunks) = result?;

    tracing::info!(
        blob = key,
        path = %merged.display(),
        size,
        chunks,
        sha256 = %sha256,
        "Chunked download complete"
    );

    Ok(ChunkedDownload {
        path: merged,
        size,
        sha256,
        chunks,
    })
}

/// Intermediate files created by one chunked download.
#[derive(Default)]
struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    async fn remove_all(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
    }
}

struct ChunkJob<'a> {
    store: &'a dyn BlobStore,
    key: &'a str,
    total: u64,
    dest_dir: &'a Path,
    base: &'a str,
    run_id: &'a str,
    chunk_size: u64,
}

impl ChunkJob<'_> {
    /// Returns the merged path, its size, SHA-256 and the chunk count.
    async fn fetch_and_merge(
        &self,
        staged: &mut StagedFiles,
    ) -> Result<(PathBuf, u64, String, usize), BlobError> {
        let (base, run_id) = (self.base, self.run_id);
        let mut parts = Vec::new();
        let mut offset = 0;
        while offset < self.total {
            let len = self.chunk_size.min(self.total - offset);
            let part = self.dest_dir.join(format!("{base}.{run_id}.part{}", parts.len()));
            staged.paths.push(part.clone());
            let bytes = self.store.get_range(self.key, offset, len).await?;
            tokio::fs::write(&part, &bytes).await?;
            tracing::debug!(blob = self.key, chunk = parts.len(), offset, len = bytes.len(), "Chunk downloaded");
            parts.push(part);
            offset += len;
        }

        let partial = self.dest_dir.join(format!("{base}_merged.{run_id}.tmp"));
        staged.paths.push(partial.clone());
        let mut out = tokio::fs::File::create(&partial).await?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        for part in &parts {
            let bytes = tokio::fs::read(part).await?;
            hasher.update(&bytes);
            size += bytes.len() as u64;
            out.write_all(&bytes).await?;
            tokio::fs::remove_file(part).await?;
        }
        out.flush().await?;
        drop(out);

        let merged = self.dest_dir.join(format!("{base}_merged"));
        tokio::fs::rename(&partial, &merged).await?;
        staged.paths.clear();

        Ok((merged, size, format!("{:x}", hasher.finalize()), parts.len()))
    }
}

/// Download one blob to `dir/<basename>`.
pub async fn download_to_dir(
    store: &dyn BlobStore,
    key: &str,
    dir: &Path,
) -> Result<PathBuf, BlobError> {
    let data = store.get(key).await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(base_name(key));
    tokio::fs::write(&path, &data).await?;
    tracing::info!(blob = key, path = %path.display(), size = data.len(), "Blob downloaded");
    Ok(path)
}

/// Every blob whose name starts with `prefix`, content decoded lossily.
pub async fn download_folder(
    store: &dyn BlobStore,
    prefix: &str,
) -> Result<Vec<FolderFile>, BlobError> {
    let entries = store.list(Some(prefix)).await?;
    if entries.is_empty() {
        return Err(BlobError::NotFound(format!("no blobs under '{prefix}'")));
    }

    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let data = store.get(&entry.name).await?;
        files.push(FolderFile {
            content: String::from_utf8_lossy(&data).into_owned(),
            name: entry.name,
        });
    }
    Ok(files)
}

/// Read `local_path` and upload it, overwriting any existing blob. The blob
/// name defaults to the file's name.
pub async fn upload_file(
    store: &dyn BlobStore,
    local_path: &Path,
    blob_name: Option<&str>,
) -> Result<UploadedBlob, BlobError> {
    let blob_name = match blob_name {
        Some(name) => name.to_string(),
        None => local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BlobError::InvalidRequest(format!(
                    "cannot derive a blob name from '{}'",
                    local_path.display()
                ))
            })?,
    };
    validate_blob_name(&blob_name)?;

    let data = tokio::fs::read(local_path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BlobError::NotFound(local_path.display().to_string())
        } else {
            BlobError::Io(e)
        }
    })?;
    let size = data.len() as u64;
    store.put(&blob_name, data).await?;
    tracing::info!(blob = %blob_name, source = %local_path.display(), size, "Blob uploaded");

    Ok(UploadedBlob { blob_name, size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalBlobStore;
    use crate::store::BlobEntry;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    /// Serves the first range of a blob, then fails every later range.
    struct FlakyRanges {
        inner: LocalBlobStore,
    }

    #[async_trait]
    impl BlobStore for FlakyRanges {
        fn backend(&self) -> &'static str {
            "flaky"
        }

        async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), BlobError> {
            self.inner.put(name, data).await
        }

        async fn get(&self, name: &str) -> Result<Vec<u8>, BlobError> {
            self.inner.get(name).await
        }

        async fn get_range(&self, name: &str, offset: u64, len: u64) -> Result<Vec<u8>, BlobError> {
            if offset > 0 {
                return Err(BlobError::Backend("connection reset".into()));
            }
            self.inner.get_range(name, offset, len).await
        }

        async fn head(&self, name: &str) -> Result<Option<BlobEntry>, BlobError> {
            self.inner.head(name).await
        }

        async fn list(&self, prefix: Option<&str>) -> Result<Vec<BlobEntry>, BlobError> {
            self.inner.list(prefix).await
        }
    }

    #[tokio::test]
    async fn failed_chunked_download_leaves_no_parts() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let store = FlakyRanges {
            inner: LocalBlobStore::new(dir.path().join("store")),
        };
        store.put("big.bin", vec![7u8; 100]).await.unwrap();

        assert_matches!(
            chunked_download(&store, "big.bin", &staging, 30).await,
            Err(BlobError::Backend(_))
        );
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn zero_chunk_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert_matches!(
            chunked_download(&store, "a", dir.path(), 0).await,
            Err(BlobError::InvalidRequest(_))
        );
    }

    #[tokio::test]
    async fn upload_defaults_blob_name_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("store"));
        let local = dir.path().join("report.csv");
        tokio::fs::write(&local, b"a,b\n").await.unwrap();

        let uploaded = upload_file(&store, &local, None).await.unwrap();
        assert_eq!(uploaded.blob_name, "report.csv");
        assert_eq!(uploaded.size, 4);
        assert_eq!(store.get("report.csv").await.unwrap(), b"a,b\n");
    }

    #[tokio::test]
    async fn upload_of_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert_matches!(
            upload_file(&store, &dir.path().join("absent.txt"), Some("x")).await,
            Err(BlobError::NotFound(_))
        );
    }
}
