use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BlobError;
use crate::local::LocalBlobStore;
use crate::retry::RetryPolicy;
use crate::s3::{S3BlobStore, S3Settings};
use crate::store::BlobStore;
use crate::transfer::DEFAULT_CHUNK_SIZE;

/// Which storage backend to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackend {
    Local { root: PathBuf },
    S3(S3Settings),
}

/// Blob-store configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    /// Range size for chunked downloads.
    pub chunk_size: u64,
    /// Where chunked downloads are assembled.
    pub staging_dir: PathBuf,
    /// Where orchestrated downloads land.
    pub download_dir: PathBuf,
    pub retry: RetryPolicy,
}

/// Named-variable source; the process environment outside of tests.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, BlobError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| BlobError::Config(format!("{name} has an invalid value '{raw}'"))),
        }
    }

    fn flag(&self, name: &str) -> Result<bool, BlobError> {
        match self.get(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(BlobError::Config(format!("{name} must be a boolean, got '{v}'"))),
        }
    }
}

impl BlobConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default               |
    /// |--------------------------------|-----------------------|
    /// | `BLOB_BACKEND`                 | `local`               |
    /// | `BLOB_LOCAL_ROOT`              | `./blobs`             |
    /// | `BLOB_BUCKET`                  | required for `s3`     |
    /// | `BLOB_REGION`                  | `us-east-1`           |
    /// | `BLOB_ENDPOINT_URL`            | unset                 |
    /// | `BLOB_FORCE_PATH_STYLE`        | `false`               |
    /// | `BLOB_CHUNK_SIZE_BYTES`        | `104857600` (100 MiB) |
    /// | `BLOB_STAGING_DIR`             | system temp dir       |
    /// | `BLOB_DOWNLOAD_DIR`            | `./downloads`         |
    /// | `BLOB_RETRY_FIRST_INTERVAL_MS` | `10000`               |
    /// | `BLOB_RETRY_MAX_ATTEMPTS`      | `3`                   |
    pub fn from_env() -> Result<Self, BlobError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BlobError> {
        let vars = Vars { lookup };
        let backend = match vars
            .get("BLOB_BACKEND")
            .unwrap_or_else(|| "local".into())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => BlobBackend::Local {
                root: vars
                    .get("BLOB_LOCAL_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./blobs")),
            },
            "s3" => BlobBackend::S3(S3Settings {
                bucket: vars.get("BLOB_BUCKET").ok_or_else(|| {
                    BlobError::Config("BLOB_BUCKET must be set for the s3 backend".into())
                })?,
                region: vars.get("BLOB_REGION").unwrap_or_else(|| "us-east-1".into()),
                endpoint_url: vars.get("BLOB_ENDPOINT_URL"),
                force_path_style: vars.flag("BLOB_FORCE_PATH_STYLE")?,
            }),
            other => {
                return Err(BlobError::Config(format!(
                    "BLOB_BACKEND must be 'local' or 's3', got '{other}'"
                )))
            }
        };

        let chunk_size = vars.parse("BLOB_CHUNK_SIZE_BYTES", DEFAULT_CHUNK_SIZE)?;
        if chunk_size == 0 {
            return Err(BlobError::Config(
                "BLOB_CHUNK_SIZE_BYTES must be greater than zero".into(),
            ));
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            first_interval: Duration::from_millis(vars.parse(
                "BLOB_RETRY_FIRST_INTERVAL_MS",
                defaults.first_interval.as_millis() as u64,
            )?),
            max_attempts: vars.parse("BLOB_RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_coefficient: defaults.backoff_coefficient,
        };

        Ok(Self {
            backend,
            chunk_size,
            staging_dir: vars
                .get("BLOB_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            download_dir: vars
                .get("BLOB_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            retry,
        })
    }

    /// Local-backend configuration rooted at `root`, everything else default.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BlobBackend::Local { root: root.into() },
            chunk_size: DEFAULT_CHUNK_SIZE,
            staging_dir: std::env::temp_dir(),
            download_dir: PathBuf::from("./downloads"),
            retry: RetryPolicy::default(),
        }
    }

    /// Construct the configured store.
    pub async fn build_store(&self) -> Arc<dyn BlobStore> {
        match &self.backend {
            BlobBackend::Local { root } => {
                tracing::info!(root = %root.display(), "Local blob store configured");
                Arc::new(LocalBlobStore::new(root.clone()))
            }
            BlobBackend::S3(settings) => Arc::new(S3BlobStore::connect(settings).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    fn load(pairs: &[(&str, &str)]) -> Result<BlobConfig, BlobError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BlobConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_selects_local_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(
            config.backend,
            BlobBackend::Local {
                root: PathBuf::from("./blobs")
            }
        );
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.download_dir, PathBuf::from("./downloads"));
    }

    #[test]
    fn s3_backend_reads_bucket_settings() {
        let config = load(&[
            ("BLOB_BACKEND", " S3 "),
            ("BLOB_BUCKET", "dropzone"),
            ("BLOB_ENDPOINT_URL", "http://localhost:9000"),
            ("BLOB_FORCE_PATH_STYLE", "yes"),
            ("BLOB_CHUNK_SIZE_BYTES", "1024"),
            ("BLOB_RETRY_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(
            config.backend,
            BlobBackend::S3(S3Settings {
                bucket: "dropzone".into(),
                region: "us-east-1".into(),
                endpoint_url: Some("http://localhost:9000".into()),
                force_path_style: true,
            })
        );
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn s3_backend_requires_bucket() {
        assert_matches!(
            load(&[("BLOB_BACKEND", "s3")]),
            Err(BlobError::Config(msg)) if msg.contains("BLOB_BUCKET")
        );
        assert_matches!(
            load(&[("BLOB_BACKEND", "s3"), ("BLOB_BUCKET", "  ")]),
            Err(BlobError::Config(_))
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert_matches!(
            load(&[("BLOB_BACKEND", "azure")]),
            Err(BlobError::Config(msg)) if msg.contains("azure")
        );
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert_matches!(
            load(&[("BLOB_CHUNK_SIZE_BYTES", "0")]),
            Err(BlobError::Config(msg)) if msg.contains("greater than zero")
        );
        assert_matches!(
            load(&[("BLOB_CHUNK_SIZE_BYTES", "lots")]),
            Err(BlobError::Config(_))
        );
    }

    #[test]
    fn bad_path_style_flag_is_rejected() {
        assert_matches!(
            load(&[
                ("BLOB_BACKEND", "s3"),
                ("BLOB_BUCKET", "b"),
                ("BLOB_FORCE_PATH_STYLE", "maybe"),
            ]),
            Err(BlobError::Config(msg)) if msg.contains("BLOB_FORCE_PATH_STYLE")
        );
    }

    #[test]
    fn local_constructor_uses_defaults() {
        let config = BlobConfig::local("/data/blobs");
        assert_eq!(
            config.backend,
            BlobBackend::Local {
                root: PathBuf::from("/data/blobs")
            }
        );
        assert_eq!(config.chunk_size, 100 * 1024 * 1024);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.first_interval, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn local_backend_builds_a_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobConfig::local(dir.path()).build_store().await;
        assert_eq!(store.backend(), "local");
    }
}
