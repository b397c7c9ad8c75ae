//! Batch processor for due jobs.

use crate::backoff::BackoffPolicy;
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;
use crate::store::QueueStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderhook_audit::{AlertSink, FailureNotice};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reason attached to every delivery failure notification.
pub const DELIVERY_FAILED: &str = "delivery_failed";

/// Performs a single delivery attempt for a job.
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, job: &QueueJob) -> QueueResult<()>;
}

/// Receives every failed attempt.
#[async_trait]
pub trait FailureObserver: Send + Sync {
    async fn on_failure(&self, now: DateTime<Utc>, job: &QueueJob, error: &str);
}

#[async_trait]
impl FailureObserver for AlertSink {
    async fn on_failure(&self, now: DateTime<Utc>, job: &QueueJob, error: &str) {
        let notice = FailureNotice::new(job.event_id.clone(), DELIVERY_FAILED, error, job.attempts);
        self.notify_at(now, &notice).await;
    }
}

/// Processor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Maximum jobs attempted per call
    pub batch_size: usize,
    pub backoff: BackoffPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Pull-based processor.
///
/// Each call selects the due jobs, attempts them one after another, and
/// persists the outcome of every attempt before moving on.
pub struct Processor {
    store: Arc<dyn QueueStore>,
    config: ProcessorConfig,
    observer: Option<Arc<dyn FailureObserver>>,
}

impl Processor {
    pub fn new(store: Arc<dyn QueueStore>, config: ProcessorConfig) -> Self {
        Self {
            store,
            config,
            observer: None,
        }
    }

    /// Attach a failure observer such as an [`AlertSink`].
    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Attempt every due job once. Returns how many jobs were attempted.
    pub async fn process_once(&self, deliverer: &dyn Deliverer) -> QueueResult<usize> {
        self.process_once_at(Utc::now(), deliverer).await
    }

    /// Like [`Processor::process_once`] with an explicit clock.
    ///
    /// A store failure while persisting an attempt aborts the rest of the
    /// batch and is returned as [`QueueError::Store`].
    pub async fn process_once_at(
        &self,
        now: DateTime<Utc>,
        deliverer: &dyn Deliverer,
    ) -> QueueResult<usize> {
        let jobs = self
            .store
            .list_due(now, self.config.batch_size)
            .await
            .map_err(into_store_error)?;

        let mut attempted = 0;
        for mut job in jobs {
            job.begin_attempt();
            attempted += 1;

            match deliverer.deliver(&job).await {
                Ok(()) => {
                    job.record_success(now);
                    info!(
                        target: "orderhook::processor",
                        job_id = %job.id,
                        event_id = %job.event_id,
                        attempts = job.attempts,
                        "job delivered"
                    );
                }
                Err(e) => {
                    let error = match e {
                        QueueError::Delivery(msg) => msg,
                        other => other.to_string(),
                    };
                    job.record_failure(now, error.clone(), &self.config.backoff);

                    warn!(
                        target: "orderhook::processor",
                        job_id = %job.id,
                        event_id = %job.event_id,
                        attempts = job.attempts,
                        status = %job.status,
                        next_retry_at = %job.next_retry_at,
                        error = %error,
                        "delivery attempt failed"
                    );

                    if let Some(observer) = &self.observer {
                        observer.on_failure(now, &job, &error).await;
                    }
                }
            }

            self.store.update(&job).await.map_err(into_store_error)?;
        }

        if attempted > 0 {
            debug!(target: "orderhook::processor", attempted, "batch finished");
        }
        Ok(attempted)
    }
}

fn into_store_error(e: QueueError) -> QueueError {
    match e {
        QueueError::Store(_) => e,
        other => QueueError::Store(other.to_string()),
    }
}
