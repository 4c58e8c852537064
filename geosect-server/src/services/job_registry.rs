//! In-memory registry of import/export job states
//!
//! Created once at startup and shared (cheap `Clone`) by the HTTP handlers and
//! the background tasks. Entries are never evicted: they live until the
//! process exits and are lost on restart. Memory therefore grows by one small
//! record per submitted job.

use std::collections::HashMap;
use std::sync::Arc;

use geosect_common::{JobKind, JobStatus};
use tokio::sync::RwLock;

/// Process-scoped map from job id to its latest status
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, JobStatus>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `job_id`
    ///
    /// A terminal entry is never replaced: the write is dropped and `false`
    /// returned, so readers cannot observe DONE/ERROR reverting.
    pub async fn register(&self, job_id: &str, status: JobStatus) -> bool {
        let mut jobs = self.jobs.write().await;
        if let Some(current) = jobs.get(job_id) {
            if current.is_terminal() {
                tracing::warn!(
                    job_id = %job_id,
                    current = %current.status,
                    attempted = %status.status,
                    "Ignoring status write for finished job"
                );
                return false;
            }
        }
        jobs.insert(job_id.to_string(), status);
        true
    }

    /// Latest status for `job_id`, `None` if never registered
    pub async fn get(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Generate a job id and register it as IN_PROGRESS
    pub async fn start(&self, kind: JobKind) -> JobStatus {
        let status = JobStatus::started(kind);
        self.register(&status.job_id, status.clone()).await;
        status
    }

    /// Register the terminal state of `job`: DONE for `Ok`, ERROR with the message otherwise
    ///
    /// Returns the status the registry holds afterwards.
    pub async fn finish(&self, job: &JobStatus, outcome: Result<(), String>) -> JobStatus {
        let terminal = match outcome {
            Ok(()) => job.done(),
            Err(message) => job.failed(message),
        };
        if self.register(&job.job_id, terminal.clone()).await {
            terminal
        } else {
            self.get(&job.job_id).await.unwrap_or(terminal)
        }
    }

    /// Number of jobs tracked since startup
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosect_common::JobState;

    #[tokio::test]
    async fn test_register_then_get_returns_latest() {
        let registry = JobRegistry::new();
        let job = JobStatus::started(JobKind::Import);

        assert!(registry.register(&job.job_id, job.clone()).await);
        assert_eq!(registry.get(&job.job_id).await, Some(job.clone()));

        let done = job.done();
        assert!(registry.register(&job.job_id, done.clone()).await);
        assert_eq!(registry.get(&job.job_id).await.unwrap().status, JobState::Done);
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let registry = JobRegistry::new();
        registry.start(JobKind::Export).await;

        assert!(registry.get("never-registered").await.is_none());
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let registry = JobRegistry::new();
        let job = registry.start(JobKind::Import).await;

        assert!(registry.register(&job.job_id, job.failed("boom")).await);
        assert!(!registry.register(&job.job_id, job.clone()).await);
        assert!(!registry.register(&job.job_id, job.done()).await);

        let current = registry.get(&job.job_id).await.unwrap();
        assert_eq!(current.status, JobState::Error);
        assert_eq!(current.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_finish_maps_outcome() {
        let registry = JobRegistry::new();
        let ok = registry.start(JobKind::Export).await;
        let failed = registry.start(JobKind::Import).await;

        assert_eq!(registry.finish(&ok, Ok(())).await.status, JobState::Done);
        let err = registry.finish(&failed, Err("bad row".to_string())).await;
        assert_eq!(err.status, JobState::Error);
        assert_eq!(err.error.as_deref(), Some("bad row"));

        // A second finish keeps the first outcome
        assert_eq!(registry.finish(&failed, Ok(())).await.status, JobState::Error);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = JobRegistry::new();
        let other = registry.clone();
        let job = registry.start(JobKind::Export).await;

        assert_eq!(other.get(&job.job_id).await.unwrap().kind, JobKind::Export);
        assert_eq!(other.len().await, 1);
        assert!(!other.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_do_not_interfere() {
        let registry = JobRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let job = registry.start(JobKind::Import).await;
                registry.register(&job.job_id, job.done()).await;
                job.job_id
            }));
        }

        for handle in handles {
            let job_id = handle.await.unwrap();
            assert_eq!(registry.get(&job_id).await.unwrap().status, JobState::Done);
        }
        assert_eq!(registry.len().await, 32);
    }
}
