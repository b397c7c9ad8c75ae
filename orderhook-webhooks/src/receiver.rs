//! Webhook receiver for signed order events
//!
//! Per request: verify, parse, deduplicate by event ID, reject payload
//! replays, persist the event and enqueue it for delivery.
//!
//! Events are stored as [`EventStatus::Received`] and become
//! [`EventStatus::Processed`] once their delivery job exists. A duplicate of
//! a still-received event enqueues the missing job before it is
//! acknowledged.

use crate::event::{EventStatus, EventStore, OrderEventFields, WebhookEvent, extract_event_id};
use crate::replay::{ReplayGuard, fingerprint};
use crate::verifier::{SignatureHeaders, SignatureVerifier};
use crate::{StoreError, VerificationError, WebhookError};
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use orderhook_audit::{AuditRecord, AuditStore};
use orderhook_queue::{JobId, QueueJob, QueueStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Successful handling of a request (HTTP 200)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// New event persisted and enqueued
    Accepted { event_id: String, job_id: JobId },
    /// Event ID already known; no new job unless the first one was never created
    Duplicate { event_id: String },
}

/// Rejected request
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("request body is empty or unreadable")]
    InvalidBody,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("payload is missing event_id or order.id")]
    MissingRequiredFields,

    #[error("payload was already received")]
    ReplayDetected,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReceiveError {
    /// Machine code returned in the response body
    pub fn code(&self) -> &'static str {
        match self {
            ReceiveError::InvalidBody => "invalid_body",
            ReceiveError::Verification(e) => e.code(),
            ReceiveError::MissingRequiredFields => "missing_required_fields",
            ReceiveError::ReplayDetected => "replay_detected",
            ReceiveError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ReceiveError::InvalidBody | ReceiveError::MissingRequiredFields => {
                StatusCode::BAD_REQUEST
            }
            ReceiveError::Verification(e) if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
            ReceiveError::Verification(_) => StatusCode::UNAUTHORIZED,
            ReceiveError::ReplayDetected => StatusCode::CONFLICT,
            ReceiveError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `{"error": "<code>"}`
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.code() })
    }
}

impl From<StoreError> for ReceiveError {
    fn from(err: StoreError) -> Self {
        ReceiveError::Internal(err.to_string())
    }
}

/// Inbound order-webhook receiver
pub struct WebhookReceiver {
    verifier: Arc<SignatureVerifier>,
    replay: ReplayGuard,
    events: Arc<dyn EventStore>,
    queue: Arc<dyn QueueStore>,
    audit: Arc<dyn AuditStore>,
}

impl WebhookReceiver {
    pub fn builder() -> WebhookReceiverBuilder {
        WebhookReceiverBuilder::default()
    }

    pub async fn receive(
        &self,
        headers: &SignatureHeaders,
        body: &[u8],
    ) -> Result<ReceiveOutcome, ReceiveError> {
        self.receive_at(Utc::now(), headers, body).await
    }

    /// Handle one request as of `now`
    pub async fn receive_at(
        &self,
        now: DateTime<Utc>,
        headers: &SignatureHeaders,
        body: &[u8],
    ) -> Result<ReceiveOutcome, ReceiveError> {
        if body.is_empty() {
            return Err(ReceiveError::InvalidBody);
        }
        let payload_fingerprint = fingerprint(body);

        if let Err(e) = self.verifier.verify_at(now.timestamp(), headers, body).await {
            // The body is authentic when only the nonce was reused.
            if matches!(e, VerificationError::SignatureReplayed) {
                if let Some((existing, text)) = self.known_event(body).await? {
                    return self.acknowledge_duplicate(now, existing, text).await;
                }
            }
            warn!(
                target: "orderhook::receiver",
                reason = e.code(),
                key_id = headers.key_id.as_deref().unwrap_or("-"),
                error = %e,
                "webhook rejected"
            );
            self.audit_rejection(now, e.code(), headers, body, &payload_fingerprint)
                .await?;
            return Err(e.into());
        }

        let text = std::str::from_utf8(body).map_err(|_| ReceiveError::InvalidBody)?;
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|_| ReceiveError::InvalidBody)?;
        let fields =
            OrderEventFields::from_json(&value).ok_or(ReceiveError::MissingRequiredFields)?;

        if let Some(existing) = self.events.find_by_event_id(&fields.event_id).await? {
            return self.acknowledge_duplicate(now, existing, text).await;
        }

        if !self.replay.check_and_mark(&payload_fingerprint).await? {
            warn!(
                target: "orderhook::receiver",
                event_id = %fields.event_id,
                fingerprint = %payload_fingerprint,
                "payload replay rejected"
            );
            self.audit_rejection(now, "replay_detected", headers, body, &payload_fingerprint)
                .await?;
            return Err(ReceiveError::ReplayDetected);
        }

        let event = WebhookEvent {
            event_id: fields.event_id.clone(),
            event_type: fields.event_type.clone(),
            order_id: fields.order_id.clone(),
            status: EventStatus::Received,
            payload_fingerprint,
            received_at: now,
            processed_at: None,
        };

        match self.events.create(&event).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return match self.events.find_by_event_id(&event.event_id).await? {
                    Some(existing) => self.acknowledge_duplicate(now, existing, text).await,
                    None => Ok(ReceiveOutcome::Duplicate {
                        event_id: event.event_id,
                    }),
                };
            }
            Err(e) => {
                error!(
                    target: "orderhook::receiver",
                    event_id = %event.event_id,
                    error = %e,
                    "failed to persist event"
                );
                if let Err(release) = self.replay.release(&event.payload_fingerprint).await {
                    warn!(
                        target: "orderhook::receiver",
                        fingerprint = %event.payload_fingerprint,
                        error = %release,
                        "failed to release payload fingerprint"
                    );
                }
                return Err(e.into());
            }
        }

        let job_id = self.enqueue(now, &event.event_id, text).await?;
        self.finish(now, &event.event_id).await;

        info!(
            target: "orderhook::receiver",
            event_id = %event.event_id,
            order_id = %event.order_id,
            event_type = event.event_type.as_deref().unwrap_or("-"),
            job_id = %job_id,
            "webhook accepted"
        );

        Ok(ReceiveOutcome::Accepted {
            event_id: event.event_id,
            job_id,
        })
    }

    /// Stored event for an authentic body, if its event ID is known
    async fn known_event<'a>(
        &self,
        body: &'a [u8],
    ) -> Result<Option<(WebhookEvent, &'a str)>, ReceiveError> {
        let Ok(text) = std::str::from_utf8(body) else {
            return Ok(None);
        };
        let Some(fields) = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .as_ref()
            .and_then(OrderEventFields::from_json)
        else {
            return Ok(None);
        };
        Ok(self
            .events
            .find_by_event_id(&fields.event_id)
            .await?
            .map(|event| (event, text)))
    }

    /// Acknowledge a known event, first enqueueing it if an earlier
    /// attempt persisted the event but never created its job.
    async fn acknowledge_duplicate(
        &self,
        now: DateTime<Utc>,
        existing: WebhookEvent,
        payload: &str,
    ) -> Result<ReceiveOutcome, ReceiveError> {
        if existing.status == EventStatus::Received {
            let jobs = self
                .queue
                .find_by_event_id(&existing.event_id)
                .await
                .map_err(|e| ReceiveError::Internal(e.to_string()))?;
            if jobs.is_empty() {
                let job_id = self.enqueue(now, &existing.event_id, payload).await?;
                warn!(
                    target: "orderhook::receiver",
                    event_id = %existing.event_id,
                    job_id = %job_id,
                    "enqueued missing delivery job for known event"
                );
            }
            self.finish(now, &existing.event_id).await;
        }

        info!(
            target: "orderhook::receiver",
            event_id = %existing.event_id,
            "duplicate event acknowledged"
        );
        Ok(ReceiveOutcome::Duplicate {
            event_id: existing.event_id,
        })
    }

    async fn enqueue(
        &self,
        now: DateTime<Utc>,
        event_id: &str,
        payload: &str,
    ) -> Result<JobId, ReceiveError> {
        let job = QueueJob::new_at(now, event_id, payload);
        self.queue.create(&job).await.map_err(|e| {
            error!(
                target: "orderhook::receiver",
                event_id,
                error = %e,
                "failed to enqueue accepted event"
            );
            ReceiveError::Internal(e.to_string())
        })?;
        Ok(job.id)
    }

    /// Mark an enqueued event processed. Failures are logged; the next
    /// duplicate retries.
    async fn finish(&self, now: DateTime<Utc>, event_id: &str) {
        if let Err(e) = self.events.mark_processed(event_id, now).await {
            warn!(
                target: "orderhook::receiver",
                event_id,
                error = %e,
                "failed to mark event processed"
            );
        }
    }

    async fn audit_rejection(
        &self,
        now: DateTime<Utc>,
        reason: &str,
        headers: &SignatureHeaders,
        body: &[u8],
        payload_fingerprint: &str,
    ) -> Result<(), ReceiveError> {
        let mut record = AuditRecord::new(reason, payload_fingerprint)
            .maybe_event_id(extract_event_id(body))
            .created_at(now);
        record.signature_header = headers.signature.clone();
        record.key_id = headers.key_id.clone();

        self.audit.create(&record).await.map_err(|e| {
            error!(
                target: "orderhook::receiver",
                reason,
                error = %e,
                "failed to write audit record"
            );
            ReceiveError::Internal(format!("audit store: {}", e))
        })
    }
}

/// Builder for [`WebhookReceiver`]
#[derive(Default)]
pub struct WebhookReceiverBuilder {
    verifier: Option<Arc<SignatureVerifier>>,
    replay: Option<ReplayGuard>,
    events: Option<Arc<dyn EventStore>>,
    queue: Option<Arc<dyn QueueStore>>,
    audit: Option<Arc<dyn AuditStore>>,
}

impl WebhookReceiverBuilder {
    pub fn verifier(mut self, verifier: Arc<SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn replay_guard(mut self, replay: ReplayGuard) -> Self {
        self.replay = Some(replay);
        self
    }

    pub fn event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn queue_store(mut self, queue: Arc<dyn QueueStore>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn audit_store(mut self, audit: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Result<WebhookReceiver, WebhookError> {
        let missing = |name: &str| WebhookError::ConfigError(format!("receiver needs a {}", name));
        Ok(WebhookReceiver {
            verifier: self.verifier.ok_or_else(|| missing("verifier"))?,
            replay: self.replay.ok_or_else(|| missing("replay guard"))?,
            events: self.events.ok_or_else(|| missing("event store"))?,
            queue: self.queue.ok_or_else(|| missing("queue store"))?,
            audit: self.audit.ok_or_else(|| missing("audit store"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{KeySetCache, KeySetCacheConfig};
    use crate::event::MemoryEventStore;
    use crate::replay::{MemoryReplayStore, ReplayStore};
    use crate::testing::{StaticKeySetFetcher, TestSigner};
    use crate::nonce::MemoryNonceStore;
    use crate::verifier::VerifierConfig;
    use async_trait::async_trait;
    use orderhook_audit::{AuditError, MemoryAuditStore};
    use orderhook_queue::{JobStatus, MemoryQueueStore, QueueError, QueueResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Harness {
        signer: TestSigner,
        receiver: WebhookReceiver,
        events: MemoryEventStore,
        queue: MemoryQueueStore,
        audit: MemoryAuditStore,
        replay: Arc<MemoryReplayStore>,
    }

    #[derive(Default)]
    struct Overrides {
        audit: Option<Arc<dyn AuditStore>>,
        events: Option<fn(MemoryEventStore) -> Arc<dyn EventStore>>,
        queue: Option<fn(MemoryQueueStore) -> Arc<dyn QueueStore>>,
        nonce_check: bool,
    }

    fn harness() -> Harness {
        harness_with(Overrides::default())
    }

    fn harness_with(overrides: Overrides) -> Harness {
        let signer = TestSigner::new("key-1", 21);
        let fetcher = Arc::new(StaticKeySetFetcher::new(TestSigner::jwk_set(&[&signer])));
        let cache = Arc::new(KeySetCache::new(fetcher, KeySetCacheConfig::default()));
        let mut verifier = SignatureVerifier::new(cache, VerifierConfig::default());
        if overrides.nonce_check {
            verifier = verifier.with_nonce_store(Arc::new(MemoryNonceStore::new()));
        }

        let events = MemoryEventStore::new();
        let queue = MemoryQueueStore::new();
        let audit = MemoryAuditStore::new();
        let replay = Arc::new(MemoryReplayStore::new());

        let event_store: Arc<dyn EventStore> = match overrides.events {
            Some(wrap) => wrap(events.clone()),
            None => Arc::new(events.clone()),
        };
        let queue_store: Arc<dyn QueueStore> = match overrides.queue {
            Some(wrap) => wrap(queue.clone()),
            None => Arc::new(queue.clone()),
        };
        let audit_store: Arc<dyn AuditStore> = match overrides.audit {
            Some(store) => store,
            None => Arc::new(audit.clone()),
        };

        let receiver = WebhookReceiver::builder()
            .verifier(Arc::new(verifier))
            .replay_guard(ReplayGuard::new(replay.clone(), Duration::from_secs(600)))
            .event_store(event_store)
            .queue_store(queue_store)
            .audit_store(audit_store)
            .build()
            .unwrap();

        Harness {
            signer,
            receiver,
            events,
            queue,
            audit,
            replay,
        }
    }

    /// Fails the first `create`, then delegates.
    struct FlakyQueue {
        inner: MemoryQueueStore,
        creates: AtomicUsize,
    }

    fn flaky_queue(inner: MemoryQueueStore) -> Arc<dyn QueueStore> {
        Arc::new(FlakyQueue {
            inner,
            creates: AtomicUsize::new(0),
        })
    }

    #[async_trait]
    impl QueueStore for FlakyQueue {
        async fn create(&self, job: &QueueJob) -> QueueResult<()> {
            if self.creates.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(QueueError::Store("connection reset".into()));
            }
            self.inner.create(job).await
        }

        async fn get(&self, id: JobId) -> QueueResult<Option<QueueJob>> {
            self.inner.get(id).await
        }

        async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> QueueResult<Vec<QueueJob>> {
            self.inner.list_due(now, limit).await
        }

        async fn update(&self, job: &QueueJob) -> QueueResult<()> {
            self.inner.update(job).await
        }

        async fn list_by_status(&self, status: JobStatus) -> QueueResult<Vec<QueueJob>> {
            self.inner.list_by_status(status).await
        }

        async fn find_by_event_id(&self, event_id: &str) -> QueueResult<Vec<QueueJob>> {
            self.inner.find_by_event_id(event_id).await
        }
    }

    /// Fails the first `create`, then delegates.
    struct FlakyEvents {
        inner: MemoryEventStore,
        creates: AtomicUsize,
    }

    fn flaky_events(inner: MemoryEventStore) -> Arc<dyn EventStore> {
        Arc::new(FlakyEvents {
            inner,
            creates: AtomicUsize::new(0),
        })
    }

    #[async_trait]
    impl EventStore for FlakyEvents {
        async fn create(&self, event: &WebhookEvent) -> Result<(), StoreError> {
            if self.creates.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.create(event).await
        }

        async fn find_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEvent>, StoreError> {
            self.inner.find_by_event_id(event_id).await
        }

        async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
            self.inner.mark_processed(event_id, at).await
        }
    }

    const BODY: &[u8] =
        br#"{"event_id":"evt_1","event_type":"order.paid","order":{"id":"100001","status":"paid"}}"#;

    #[tokio::test]
    async fn test_accepts_and_enqueues() {
        let h = harness();
        let now = Utc::now();
        let headers = h.signer.headers_at(now.timestamp(), BODY);

        let outcome = h.receiver.receive_at(now, &headers, BODY).await.unwrap();
        let ReceiveOutcome::Accepted { event_id, job_id } = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(event_id, "evt_1");

        let event = h.events.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Processed);
        assert_eq!(event.processed_at, Some(now));
        assert_eq!(event.order_id, "100001");

        let job = h.queue.get(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.payload.as_bytes(), BODY);
        assert!(h.audit.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_event_id_is_acknowledged() {
        let h = harness();
        let now = Utc::now();
        let headers = h.signer.headers_at(now.timestamp(), BODY);

        h.receiver.receive_at(now, &headers, BODY).await.unwrap();
        let second = h.receiver.receive_at(now, &headers, BODY).await.unwrap();

        assert_eq!(
            second,
            ReceiveOutcome::Duplicate {
                event_id: "evt_1".into()
            }
        );
        assert_eq!(h.events.len().await, 1);
        assert_eq!(h.queue.len().await, 1);
        assert!(h.audit.is_empty().await);
    }

    #[tokio::test]
    async fn test_replayed_payload_is_rejected_and_audited() {
        let h = harness();
        let now = Utc::now();
        h.replay
            .mark(&fingerprint(BODY), Duration::from_secs(600))
            .await
            .unwrap();

        let headers = h.signer.headers_at(now.timestamp(), BODY);
        let err = h.receiver.receive_at(now, &headers, BODY).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "replay_detected");
        assert!(h.queue.is_empty().await);
        assert!(h.events.is_empty().await);

        let records = h.audit.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "replay_detected");
        assert_eq!(records[0].event_id.as_deref(), Some("evt_1"));
    }

    #[tokio::test]
    async fn test_bad_signature_is_audited_not_persisted() {
        let h = harness();
        let now = Utc::now();
        let headers = h.signer.headers_at(now.timestamp(), BODY);
        let tampered = BODY.to_vec().into_iter().map(|b| if b == b'1' { b'2' } else { b }).collect::<Vec<_>>();

        let err = h.receiver.receive_at(now, &headers, &tampered).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "invalid_signature");
        assert!(h.events.is_empty().await);
        assert!(h.queue.is_empty().await);
        assert_eq!(h.replay.len().await, 0);

        let records = h.audit.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "invalid_signature");
        assert_eq!(records[0].key_id.as_deref(), Some("key-1"));
        assert_eq!(records[0].signature_header, headers.signature);
        assert_eq!(records[0].payload_fingerprint, fingerprint(&tampered));
    }

    #[tokio::test]
    async fn test_missing_fields_are_not_audited() {
        let h = harness();
        let now = Utc::now();
        let body = br#"{"event_type":"order.paid","order":{"status":"paid"}}"#;
        let headers = h.signer.headers_at(now.timestamp(), body);

        let err = h.receiver.receive_at(now, &headers, body).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "missing_required_fields");
        assert!(h.audit.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let h = harness();
        let err = h
            .receiver
            .receive(&SignatureHeaders::default(), b"")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_body");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_json_body_after_valid_signature() {
        let h = harness();
        let now = Utc::now();
        let body = b"not json";
        let headers = h.signer.headers_at(now.timestamp(), body);

        let err = h.receiver.receive_at(now, &headers, body).await.unwrap_err();
        assert_eq!(err.code(), "invalid_body");
    }

    struct BrokenAudit;

    #[async_trait]
    impl AuditStore for BrokenAudit {
        async fn create(&self, _record: &AuditRecord) -> orderhook_audit::Result<()> {
            Err(AuditError::Store("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_audit_failure_is_internal_error() {
        let h = harness_with(Overrides {
            audit: Some(Arc::new(BrokenAudit)),
            ..Overrides::default()
        });
        let err = h
            .receiver
            .receive(&SignatureHeaders::default(), BODY)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_error");
    }

    #[tokio::test]
    async fn test_retry_after_failed_enqueue_creates_the_job() {
        let h = harness_with(Overrides {
            queue: Some(flaky_queue),
            ..Overrides::default()
        });
        let now = Utc::now();

        let first = h
            .receiver
            .receive_at(now, &h.signer.headers_at(now.timestamp(), BODY), BODY)
            .await
            .unwrap_err();
        assert_eq!(first.code(), "internal_error");
        assert!(h.queue.is_empty().await);
        let stored = h.events.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Received);

        let retry = h
            .receiver
            .receive_at(now, &h.signer.headers_at(now.timestamp() - 1, BODY), BODY)
            .await
            .unwrap();
        assert_eq!(
            retry,
            ReceiveOutcome::Duplicate {
                event_id: "evt_1".into()
            }
        );

        let jobs = h.queue.find_by_event_id("evt_1").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].payload.as_bytes(), BODY);
        let stored = h.events.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Processed);

        // Later duplicates leave the queue alone.
        h.receiver
            .receive_at(now, &h.signer.headers_at(now.timestamp() - 2, BODY), BODY)
            .await
            .unwrap();
        assert_eq!(h.queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_persist_releases_fingerprint() {
        let h = harness_with(Overrides {
            events: Some(flaky_events),
            ..Overrides::default()
        });
        let now = Utc::now();

        let first = h
            .receiver
            .receive_at(now, &h.signer.headers_at(now.timestamp(), BODY), BODY)
            .await
            .unwrap_err();
        assert_eq!(first.code(), "internal_error");
        assert_eq!(h.replay.len().await, 0);

        let retry = h
            .receiver
            .receive_at(now, &h.signer.headers_at(now.timestamp() - 1, BODY), BODY)
            .await
            .unwrap();
        assert!(matches!(retry, ReceiveOutcome::Accepted { .. }));
        assert_eq!(h.queue.len().await, 1);
        assert!(h.audit.is_empty().await);
    }

    #[tokio::test]
    async fn test_identical_resend_of_known_event_is_acknowledged() {
        let h = harness_with(Overrides {
            nonce_check: true,
            ..Overrides::default()
        });
        let now = Utc::now();
        let headers = h.signer.headers_at(now.timestamp(), BODY);

        h.receiver.receive_at(now, &headers, BODY).await.unwrap();
        let second = h.receiver.receive_at(now, &headers, BODY).await.unwrap();

        assert_eq!(
            second,
            ReceiveOutcome::Duplicate {
                event_id: "evt_1".into()
            }
        );
        assert_eq!(h.queue.len().await, 1);
        assert!(h.audit.is_empty().await);
    }

    #[tokio::test]
    async fn test_reused_signature_for_unknown_event_is_rejected() {
        let h = harness_with(Overrides {
            nonce_check: true,
            ..Overrides::default()
        });
        let now = Utc::now();
        let body = br#"{"event_id":"evt_5","order":{}}"#;
        let headers = h.signer.headers_at(now.timestamp(), body);

        let first = h.receiver.receive_at(now, &headers, body).await.unwrap_err();
        assert_eq!(first.code(), "missing_required_fields");

        let second = h.receiver.receive_at(now, &headers, body).await.unwrap_err();
        assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(second.code(), "signature_replayed");

        let records = h.audit.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "signature_replayed");
    }

    #[test]
    fn test_error_body() {
        let err = ReceiveError::Verification(VerificationError::KeySetUnavailable("down".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), serde_json::json!({"error": "key_set_unavailable"}));
    }

    #[test]
    fn test_builder_requires_all_parts() {
        assert!(matches!(
            WebhookReceiver::builder().build(),
            Err(WebhookError::ConfigError(_))
        ));
    }
}
