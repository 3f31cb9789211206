//! Durable-style orchestration of blob activities.
//!
//! An orchestration runs exactly one activity (list, download or upload)
//! under the configured [`RetryPolicy`] and reports a serializable outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::BlobError;
use crate::retry::{retry, RetryPolicy};
use crate::store::BlobStore;
use crate::transfer::{download_to_dir, upload_file};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobAction {
    List,
    Download { filepath: String },
    Upload { filepath: String, blob_name: Option<String> },
}

impl BlobAction {
    /// Build an action from its query-string form.
    ///
    /// `download` and `upload` require `filepath`.
    pub fn parse(
        action: &str,
        filepath: Option<String>,
        blob_name: Option<String>,
    ) -> Result<Self, BlobError> {
        let filepath = filepath.filter(|f| !f.trim().is_empty());
        match action.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "download" => filepath
                .map(|filepath| Self::Download { filepath })
                .ok_or_else(|| BlobError::InvalidRequest("download requires 'filepath'".into())),
            "upload" => filepath
                .map(|filepath| Self::Upload {
                    filepath,
                    blob_name: blob_name.filter(|b| !b.trim().is_empty()),
                })
                .ok_or_else(|| BlobError::InvalidRequest("upload requires 'filepath'".into())),
            other => Err(BlobError::InvalidRequest(format!(
                "unknown action '{other}' (expected list, download or upload)"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Download { .. } => "download",
            Self::Upload { .. } => "upload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrchestrationOutput {
    Success { result: serde_json::Value },
    Failed { message: String },
}

impl OrchestrationOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Clone)]
pub struct BlobOrchestrator {
    store: Arc<dyn BlobStore>,
    retry: RetryPolicy,
    download_dir: PathBuf,
}

impl BlobOrchestrator {
    pub fn new(store: Arc<dyn BlobStore>, retry: RetryPolicy, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            retry,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    #[tracing::instrument(skip(self, action), fields(action = action.name()))]
    pub async fn run(&self, action: BlobAction) -> OrchestrationOutput {
        let result = match &action {
            BlobAction::List => self.list().await,
            BlobAction::Download { filepath } => self.download(filepath).await,
            BlobAction::Upload { filepath, blob_name } => {
                self.upload(filepath, blob_name.as_deref()).await
            }
        };

        match result {
            Ok(result) => {
                tracing::info!("Orchestration succeeded");
                OrchestrationOutput::Success { result }
            }
            Err(e) => {
                tracing::error!(error = %e, "Orchestration failed");
                OrchestrationOutput::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn list(&self) -> Result<serde_json::Value, BlobError> {
        let entries = retry(
            &self.retry,
            "list_blobs",
            || self.store.list(None),
            BlobError::is_transient,
        )
        .await?;
        to_value(&entries)
    }

    async fn download(&self, filepath: &str) -> Result<serde_json::Value, BlobError> {
        let path = retry(
            &self.retry,
            "download_blob",
            || download_to_dir(self.store.as_ref(), filepath, &self.download_dir),
            BlobError::is_transient,
        )
        .await?;
        Ok(serde_json::json!({
            "blob_name": filepath,
            "path": path.display().to_string(),
        }))
    }

    async fn upload(
        &self,
        filepath: &str,
        blob_name: Option<&str>,
    ) -> Result<serde_json::Value, BlobError> {
        let uploaded = retry(
            &self.retry,
            "upload_blob",
            || upload_file(self.store.as_ref(), Path::new(filepath), blob_name),
            BlobError::is_transient,
        )
        .await?;
        to_value(&uploaded)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, BlobError> {
    serde_json::to_value(value).map_err(|e| BlobError::Backend(format!("serialize result: {e}")))
}
