//! Queue storage.

use crate::error::{QueueError, QueueResult};
use crate::job::{JobId, JobStatus, QueueJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Durable job storage used by the processor.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new job.
    async fn create(&self, job: &QueueJob) -> QueueResult<()>;

    async fn get(&self, id: JobId) -> QueueResult<Option<QueueJob>>;

    /// Up to `limit` active jobs with `next_retry_at <= now`, oldest-due first.
    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> QueueResult<Vec<QueueJob>>;

    /// Replace a stored job.
    async fn update(&self, job: &QueueJob) -> QueueResult<()>;

    /// All jobs with the given status, oldest first.
    async fn list_by_status(&self, status: JobStatus) -> QueueResult<Vec<QueueJob>>;

    /// Jobs created for an event, oldest first.
    async fn find_by_event_id(&self, event_id: &str) -> QueueResult<Vec<QueueJob>>;
}

/// In-process queue store.
#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    jobs: Arc<RwLock<HashMap<JobId, QueueJob>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Snapshot of every job, oldest first.
    pub async fn all(&self) -> Vec<QueueJob> {
        let mut jobs: Vec<QueueJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn create(&self, job: &QueueJob) -> QueueResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::DuplicateJob(job.id.to_string()));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> QueueResult<Option<QueueJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> QueueResult<Vec<QueueJob>> {
        let jobs = self.jobs.read().await;
        let mut due: Vec<QueueJob> = jobs.values().filter(|j| j.is_due(now)).cloned().collect();
        due.sort_by(|a, b| {
            a.next_retry_at
                .cmp(&b.next_retry_at)
                .then(a.created_at.cmp(&b.created_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn update(&self, job: &QueueJob) -> QueueResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(QueueError::JobNotFound(job.id.to_string())),
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> QueueResult<Vec<QueueJob>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<QueueJob> =
            jobs.values().filter(|j| j.status == status).cloned().collect();
        matching.sort_by_key(|j| j.created_at);
        Ok(matching)
    }

    async fn find_by_event_id(&self, event_id: &str) -> QueueResult<Vec<QueueJob>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<QueueJob> = jobs
            .values()
            .filter(|j| j.event_id == event_id)
            .cloned()
            .collect();
        matching.sort_by_key(|j| j.created_at);
        Ok(matching)
    }
}
