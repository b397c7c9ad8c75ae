//! Dead-letter queue for manual replay.
//!
//! The processor never writes here. Operators call
//! [`DeadLetterQueue::capture_failed`] to collect exhausted jobs and
//! [`DeadLetterQueue::replay`] to push one back onto the queue.

use crate::error::{QueueError, QueueResult};
use crate::job::{JobId, JobStatus, QueueJob};
use crate::store::QueueStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// A failed job parked for an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    /// Job that exhausted its attempts
    pub job_id: JobId,
    pub event_id: String,
    pub payload: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub replayed_at: Option<DateTime<Utc>>,
    /// Job created by the replay
    pub replay_job_id: Option<JobId>,
}

impl DeadLetterEntry {
    pub fn from_job(job: &QueueJob, captured_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            event_id: job.event_id.clone(),
            payload: job.payload.clone(),
            attempts: job.attempts,
            last_error: job.last_error.clone(),
            captured_at,
            replayed_at: None,
            replay_job_id: None,
        }
    }

    pub fn is_replayed(&self) -> bool {
        self.replayed_at.is_some()
    }
}

/// Dead-letter persistence.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn create(&self, entry: &DeadLetterEntry) -> QueueResult<()>;

    async fn get(&self, id: Uuid) -> QueueResult<Option<DeadLetterEntry>>;

    /// Whether the job was already captured.
    async fn contains_job(&self, job_id: JobId) -> QueueResult<bool>;

    async fn update(&self, entry: &DeadLetterEntry) -> QueueResult<()>;

    /// Oldest first.
    async fn list(&self) -> QueueResult<Vec<DeadLetterEntry>>;
}

#[derive(Clone, Default)]
pub struct MemoryDeadLetterStore {
    entries: Arc<RwLock<HashMap<Uuid, DeadLetterEntry>>>,
}

impl MemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetterStore {
    async fn create(&self, entry: &DeadLetterEntry) -> QueueResult<()> {
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> QueueResult<Option<DeadLetterEntry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn contains_job(&self, job_id: JobId) -> QueueResult<bool> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .any(|e| e.job_id == job_id))
    }

    async fn update(&self, entry: &DeadLetterEntry) -> QueueResult<()> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.id) {
            Some(slot) => {
                *slot = entry.clone();
                Ok(())
            }
            None => Err(QueueError::EntryNotFound(entry.id.to_string())),
        }
    }

    async fn list(&self) -> QueueResult<Vec<DeadLetterEntry>> {
        let mut entries: Vec<DeadLetterEntry> =
            self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.captured_at);
        Ok(entries)
    }
}

/// Operator-facing dead-letter service.
pub struct DeadLetterQueue {
    queue: Arc<dyn QueueStore>,
    store: Arc<dyn DeadLetterStore>,
}

impl DeadLetterQueue {
    pub fn new(queue: Arc<dyn QueueStore>, store: Arc<dyn DeadLetterStore>) -> Self {
        Self { queue, store }
    }

    /// Copy every `failed` job not yet captured. Returns the number captured.
    pub async fn capture_failed(&self) -> QueueResult<usize> {
        self.capture_failed_at(Utc::now()).await
    }

    pub async fn capture_failed_at(&self, now: DateTime<Utc>) -> QueueResult<usize> {
        let failed = self.queue.list_by_status(JobStatus::Failed).await?;

        let mut captured = 0;
        for job in &failed {
            if self.store.contains_job(job.id).await? {
                continue;
            }
            let entry = DeadLetterEntry::from_job(job, now);
            self.store.create(&entry).await?;
            captured += 1;

            info!(
                target: "orderhook::dead_letter",
                entry_id = %entry.id,
                job_id = %job.id,
                event_id = %job.event_id,
                "job captured"
            );
        }
        Ok(captured)
    }

    /// Enqueue a fresh pending job for the entry's event and payload.
    pub async fn replay(&self, entry_id: Uuid) -> QueueResult<QueueJob> {
        self.replay_at(Utc::now(), entry_id).await
    }

    pub async fn replay_at(&self, now: DateTime<Utc>, entry_id: Uuid) -> QueueResult<QueueJob> {
        let mut entry = self
            .store
            .get(entry_id)
            .await?
            .ok_or_else(|| QueueError::EntryNotFound(entry_id.to_string()))?;

        if entry.is_replayed() {
            return Err(QueueError::AlreadyReplayed(entry_id.to_string()));
        }

        let job = QueueJob::new_at(now, entry.event_id.clone(), entry.payload.clone());
        self.queue.create(&job).await?;

        entry.replayed_at = Some(now);
        entry.replay_job_id = Some(job.id);
        self.store.update(&entry).await?;

        info!(
            target: "orderhook::dead_letter",
            entry_id = %entry.id,
            job_id = %job.id,
            event_id = %job.event_id,
            "entry replayed"
        );
        Ok(job)
    }

    pub async fn list(&self) -> QueueResult<Vec<DeadLetterEntry>> {
        self.store.list().await
    }
}
