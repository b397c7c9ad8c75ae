//! Queue job definition and state transitions.

use crate::backoff::BackoffPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Job unique identifier.
pub type JobId = Uuid;

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for its first attempt
    Pending,
    /// Failed at least once, scheduled again
    Retrying,
    /// Delivered (terminal)
    Processed,
    /// Attempts exhausted (terminal)
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Retrying => "retrying",
            JobStatus::Processed => "processed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the processor may pick this job up again.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Retrying)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound delivery of one accepted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    /// Unique job identifier
    pub id: JobId,

    /// Business event ID the payload belongs to
    pub event_id: String,

    /// Raw accepted payload, forwarded byte for byte
    pub payload: String,

    pub status: JobStatus,

    /// Number of delivery attempts made so far
    pub attempts: u32,

    /// Earliest time the job is due again
    pub next_retry_at: DateTime<Utc>,

    pub last_error: Option<String>,

    pub last_attempt_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl QueueJob {
    /// Create a pending job that is due immediately.
    pub fn new(event_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new_at(Utc::now(), event_id, payload)
    }

    /// Create a pending job due at `now`.
    pub fn new_at(now: DateTime<Utc>, event_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event_id.into(),
            payload: payload.into(),
            status: JobStatus::Pending,
            attempts: 0,
            next_retry_at: now,
            last_error: None,
            last_attempt_at: None,
            created_at: now,
        }
    }

    /// Check if the job is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.next_retry_at <= now
    }

    pub fn is_terminal(&self) -> bool {
        !self.status.is_active()
    }

    /// Count a new attempt.
    pub fn begin_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Mark the current attempt as delivered.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processed;
        self.next_retry_at = now;
    }

    /// Mark the current attempt as failed and schedule the next one.
    pub fn record_failure(&mut self, now: DateTime<Utc>, error: impl Into<String>, backoff: &BackoffPolicy) {
        self.last_error = Some(error.into());
        self.last_attempt_at = Some(now);

        if backoff.is_exhausted(self.attempts) {
            self.status = JobStatus::Failed;
        } else {
            self.status = JobStatus::Retrying;
            self.next_retry_at = add_duration(now, backoff.delay(self.attempts));
        }
    }
}

pub(crate) fn add_duration(at: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    let delta = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
