use std::sync::Arc;
use std::time::Duration;

use dropzone_cloud::{BlobOrchestrator, BlobStore};

use crate::config::ServerConfig;
use crate::orchestrations::OrchestrationRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (chunk size, staging dir, limits).
    pub config: Arc<ServerConfig>,
    /// Configured blob backend.
    pub store: Arc<dyn BlobStore>,
    /// Runs blob activities under the retry policy.
    pub orchestrator: BlobOrchestrator,
    /// Started orchestration instances and their status.
    pub orchestrations: Arc<OrchestrationRegistry>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn BlobStore>) -> Self {
        let orchestrator = BlobOrchestrator::new(
            Arc::clone(&store),
            config.blob.retry.clone(),
            config.blob.download_dir.clone(),
        );
        let orchestrations = Arc::new(OrchestrationRegistry::with_limits(
            Duration::from_secs(config.orchestration_retention_secs),
            config.orchestration_max_finished,
        ));
        Self {
            config: Arc::new(config),
            store,
            orchestrator,
            orchestrations,
        }
    }
}
