//! In-memory registry of orchestration instances.
//!
//! Each started orchestration gets a UUID and runs on its own task; its
//! runtime status moves `pending -> running -> completed | failed`.
//! Finished instances are evicted once they outlive the retention window
//! or exceed the finished-instance cap, oldest first.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dropzone_cloud::{BlobAction, BlobOrchestrator, OrchestrationOutput};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RuntimeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of one orchestration instance.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationInstance {
    pub instance_id: Uuid,
    pub function_name: String,
    pub action: &'static str,
    pub runtime_status: RuntimeStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub output: Option<OrchestrationOutput>,
}

/// Default time a finished instance stays queryable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Default cap on finished instances held at once.
pub const DEFAULT_MAX_FINISHED: usize = 1000;

/// Tracks orchestrations started by this process.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` inside `AppState`.
/// Pending and running instances are never evicted.
pub struct OrchestrationRegistry {
    instances: RwLock<HashMap<Uuid, OrchestrationInstance>>,
    retention: Duration,
    max_finished: usize,
}

impl Default for OrchestrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationRegistry {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_RETENTION, DEFAULT_MAX_FINISHED)
    }

    pub fn with_limits(retention: Duration, max_finished: usize) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            retention,
            max_finished,
        }
    }

    /// Record a new pending instance and run it in the background.
    pub async fn start(
        self: &std::sync::Arc<Self>,
        orchestrator: BlobOrchestrator,
        function_name: String,
        action: BlobAction,
    ) -> OrchestrationInstance {
        let now = Utc::now();
        let instance = OrchestrationInstance {
            instance_id: Uuid::new_v4(),
            function_name,
            action: action.name(),
            runtime_status: RuntimeStatus::Pending,
            created_at: now,
            last_updated_at: now,
            output: None,
        };
        let id = instance.instance_id;
        {
            let mut instances = self.instances.write().await;
            self.evict_finished(&mut instances, now);
            instances.insert(id, instance.clone());
        }
        tracing::info!(instance_id = %id, function = %instance.function_name, action = instance.action, "Orchestration started");

        let registry = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            registry.update(id, RuntimeStatus::Running, None).await;
            let output = orchestrator.run(action).await;
            let status = if output.is_success() {
                RuntimeStatus::Completed
            } else {
                RuntimeStatus::Failed
            };
            registry.update(id, status, Some(output)).await;
            tracing::info!(instance_id = %id, status = ?status, "Orchestration finished");
        });

        instance
    }

    pub async fn get(&self, id: Uuid) -> Option<OrchestrationInstance> {
        self.instances.read().await.get(&id).cloned()
    }

    /// Number of instances not yet completed or failed.
    pub async fn active_count(&self) -> usize {
        self.instances
            .read()
            .await
            .values()
            .filter(|i| !i.runtime_status.is_terminal())
            .count()
    }

    /// Number of instances currently held, finished ones included.
    pub async fn tracked_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Drop finished instances that are past retention as of `now`, then
    /// the oldest finished ones above the cap. Returns how many were removed.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut instances = self.instances.write().await;
        self.evict_finished(&mut instances, now)
    }

    fn evict_finished(
        &self,
        instances: &mut HashMap<Uuid, OrchestrationInstance>,
        now: DateTime<Utc>,
    ) -> usize {
        let before = instances.len();
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        instances.retain(|_, i| !i.runtime_status.is_terminal() || i.last_updated_at >= cutoff);

        let mut finished: Vec<(DateTime<Utc>, Uuid)> = instances
            .values()
            .filter(|i| i.runtime_status.is_terminal())
            .map(|i| (i.last_updated_at, i.instance_id))
            .collect();
        if finished.len() > self.max_finished {
            finished.sort();
            let excess = finished.len() - self.max_finished;
            for (_, id) in finished.into_iter().take(excess) {
                instances.remove(&id);
            }
        }

        let removed = before - instances.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = instances.len(), "Evicted finished orchestrations");
        }
        removed
    }

    async fn update(&self, id: Uuid, status: RuntimeStatus, output: Option<OrchestrationOutput>) {
        let mut instances = self.instances.write().await;
        let now = Utc::now();
        if let Some(instance) = instances.get_mut(&id) {
            instance.runtime_status = status;
            instance.last_updated_at = now;
            if output.is_some() {
                instance.output = output;
            }
        }
        if status.is_terminal() {
            self.evict_finished(&mut instances, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use dropzone_cloud::{BlobStore, LocalBlobStore, RetryPolicy};

    async fn wait_for_terminal(registry: &OrchestrationRegistry, id: Uuid) -> OrchestrationInstance {
        for _ in 0..200 {
            let instance = registry.get(id).await.unwrap();
            if instance.runtime_status.is_terminal() {
                return instance;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("orchestration {id} did not finish");
    }

    #[tokio::test]
    async fn list_orchestration_completes() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
        store.put("a.txt", b"a".to_vec()).await.unwrap();
        let orchestrator = BlobOrchestrator::new(store, RetryPolicy::immediate(1), dir.path());

        let registry = Arc::new(OrchestrationRegistry::new());
        let started = registry
            .start(orchestrator, "blob_orchestrator".into(), BlobAction::List)
            .await;
        assert_eq!(started.runtime_status, RuntimeStatus::Pending);

        let finished = wait_for_terminal(&registry, started.instance_id).await;
        assert_eq!(finished.runtime_status, RuntimeStatus::Completed);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn failed_activity_marks_instance_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
        let orchestrator = BlobOrchestrator::new(store, RetryPolicy::immediate(1), dir.path());

        let registry = Arc::new(OrchestrationRegistry::new());
        let started = registry
            .start(
                orchestrator,
                "blob_orchestrator".into(),
                BlobAction::Download {
                    filepath: "absent".into(),
                },
            )
            .await;

        let finished = wait_for_terminal(&registry, started.instance_id).await;
        assert_eq!(finished.runtime_status, RuntimeStatus::Failed);
        assert!(matches!(finished.output, Some(OrchestrationOutput::Failed { .. })));
    }

    async fn wait_until_idle(registry: &OrchestrationRegistry) {
        for _ in 0..200 {
            if registry.active_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("orchestrations did not finish");
    }

    #[tokio::test]
    async fn finished_instances_past_retention_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
        let orchestrator = BlobOrchestrator::new(store, RetryPolicy::immediate(1), dir.path());

        let registry = Arc::new(OrchestrationRegistry::with_limits(Duration::from_secs(60), 100));
        let done = registry
            .start(orchestrator.clone(), "blob_orchestrator".into(), BlobAction::List)
            .await;
        wait_for_terminal(&registry, done.instance_id).await;

        assert_eq!(registry.prune(Utc::now()).await, 0);
        assert!(registry.get(done.instance_id).await.is_some());

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(registry.prune(later).await, 1);
        assert!(registry.get(done.instance_id).await.is_none());
        assert_eq!(registry.tracked_count().await, 0);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn finished_instances_above_cap_are_evicted_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
        let orchestrator = BlobOrchestrator::new(store, RetryPolicy::immediate(1), dir.path());

        let registry = Arc::new(OrchestrationRegistry::with_limits(Duration::from_secs(3600), 2));
        let mut ids = Vec::new();
        for _ in 0..4 {
            let started = registry
                .start(orchestrator.clone(), "blob_orchestrator".into(), BlobAction::List)
                .await;
            wait_until_idle(&registry).await;
            ids.push(started.instance_id);
        }

        assert_eq!(registry.tracked_count().await, 2);
        assert_eq!(registry.active_count().await, 0);
        assert!(registry.get(ids[0]).await.is_none());
        assert!(registry.get(ids[1]).await.is_none());
        assert!(registry.get(ids[3]).await.is_some());
    }
}
