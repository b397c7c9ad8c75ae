//! Alert sink
//!
//! Turns raw delivery failures into deduplicated operator alerts.

use crate::{AlertRecord, AlertStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// When an alert is worth raising
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Failures below this attempt count are not alerted on
    pub min_attempts: u32,
    /// At most one alert per `(event_id, reason)` inside this window
    pub dedupe_window: Duration,
}

impl AlertPolicy {
    pub fn new(min_attempts: u32, dedupe_window: Duration) -> Self {
        Self {
            min_attempts,
            dedupe_window,
        }
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(3600))
    }
}

/// A failure observed by the delivery processor
#[derive(Debug, Clone, PartialEq)]
pub struct FailureNotice {
    pub event_id: String,
    pub reason: String,
    pub details: String,
    pub attempt_count: u32,
}

impl FailureNotice {
    pub fn new(
        event_id: impl Into<String>,
        reason: impl Into<String>,
        details: impl Into<String>,
        attempt_count: u32,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            reason: reason.into(),
            details: details.into(),
            attempt_count,
        }
    }
}

/// Outcome of a single notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Raised,
    BelowThreshold,
    Deduplicated,
    /// The store failed; the failure was logged and dropped
    Dropped,
}

/// Best-effort alert sink.
///
/// Never returns an error: store failures are logged and swallowed so that a
/// broken alert path cannot stall delivery processing.
pub struct AlertSink {
    store: Arc<dyn AlertStore>,
    policy: AlertPolicy,
}

impl AlertSink {
    pub fn new(store: Arc<dyn AlertStore>, policy: AlertPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Report a failure using the current wall clock
    pub async fn notify(&self, notice: &FailureNotice) -> AlertOutcome {
        self.notify_at(Utc::now(), notice).await
    }

    /// Report a failure observed at `now`
    pub async fn notify_at(&self, now: DateTime<Utc>, notice: &FailureNotice) -> AlertOutcome {
        if notice.attempt_count < self.policy.min_attempts {
            debug!(
                target: "orderhook::alerts",
                event_id = %notice.event_id,
                attempts = notice.attempt_count,
                "failure below alert threshold"
            );
            return AlertOutcome::BelowThreshold;
        }

        let window = chrono::Duration::from_std(self.policy.dedupe_window)
            .unwrap_or(chrono::Duration::MAX);
        let since = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        match self
            .store
            .exists_recent(&notice.event_id, &notice.reason, since)
            .await
        {
            Ok(true) => return AlertOutcome::Deduplicated,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    target: "orderhook::alerts",
                    event_id = %notice.event_id,
                    error = %e,
                    "alert lookup failed"
                );
                return AlertOutcome::Dropped;
            }
        }

        let alert = AlertRecord::new(
            notice.event_id.clone(),
            notice.reason.clone(),
            notice.details.clone(),
            notice.attempt_count,
            now,
        );

        match self.store.create(&alert).await {
            Ok(()) => {
                info!(
                    target: "orderhook::alerts",
                    event_id = %alert.event_id,
                    reason = %alert.reason,
                    attempts = alert.attempt_count,
                    "alert raised"
                );
                AlertOutcome::Raised
            }
            Err(e) => {
                warn!(
                    target: "orderhook::alerts",
                    event_id = %alert.event_id,
                    error = %e,
                    "failed to persist alert"
                );
                AlertOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditError, MemoryAlertStore, Result};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl AlertStore for BrokenStore {
        async fn create(&self, _alert: &AlertRecord) -> Result<()> {
            Err(AuditError::Store("database is down".into()))
        }

        async fn exists_recent(&self, _: &str, _: &str, _: DateTime<Utc>) -> Result<bool> {
            Ok(false)
        }
    }

    fn notice(attempts: u32) -> FailureNotice {
        FailureNotice::new("evt_1", "delivery_failed", "status 503", attempts)
    }

    #[tokio::test]
    async fn test_threshold_and_dedupe() {
        let store = MemoryAlertStore::new();
        let sink = AlertSink::new(
            Arc::new(store.clone()),
            AlertPolicy::new(2, Duration::from_secs(3600)),
        );
        let t0 = Utc::now();

        assert_eq!(sink.notify_at(t0, &notice(1)).await, AlertOutcome::BelowThreshold);
        assert_eq!(store.len().await, 0);

        let t1 = t0 + chrono::Duration::minutes(1);
        assert_eq!(sink.notify_at(t1, &notice(2)).await, AlertOutcome::Raised);
        assert_eq!(store.len().await, 1);

        let t2 = t0 + chrono::Duration::minutes(3);
        assert_eq!(sink.notify_at(t2, &notice(3)).await, AlertOutcome::Deduplicated);
        assert_eq!(store.len().await, 1);

        let t3 = t1 + chrono::Duration::minutes(61);
        assert_eq!(sink.notify_at(t3, &notice(4)).await, AlertOutcome::Raised);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_distinct_events_alert_independently() {
        let store = MemoryAlertStore::new();
        let sink = AlertSink::new(Arc::new(store.clone()), AlertPolicy::default());
        let now = Utc::now();

        sink.notify_at(now, &notice(2)).await;
        sink.notify_at(
            now,
            &FailureNotice::new("evt_2", "delivery_failed", "timeout", 2),
        )
        .await;

        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let sink = AlertSink::new(Arc::new(BrokenStore), AlertPolicy::default());
        assert_eq!(sink.notify(&notice(5)).await, AlertOutcome::Dropped);
    }
}
