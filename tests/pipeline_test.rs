//! End-to-end tests for the orderhook pipeline.
//!
//! Each test wires the service from settings against mock key-set and
//! delivery servers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderhook::App;
use orderhook::prelude::*;
use orderhook_audit::MemoryAuditStore;
use orderhook_config::Settings;
use orderhook_queue::MemoryQueueStore;
use orderhook_webhooks::testing::TestSigner;
use orderhook_webhooks::{
    EventStore, MemoryReplayStore, ReplayGuard, StoreError, VerifierConfig, WebhookEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Harness
// =============================================================================

struct Env {
    keys: MockServer,
    target: MockServer,
    signer: TestSigner,
}

impl Env {
    async fn start() -> Self {
        let keys = MockServer::start().await;
        let target = MockServer::start().await;
        let signer = TestSigner::new("ucp-2025", 42);

        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(TestSigner::jwk_set(&[&signer])),
            )
            .mount(&keys)
            .await;

        Self {
            keys,
            target,
            signer,
        }
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.verifier.jwk_set_url = Some(format!("{}/jwks.json", self.keys.uri()));
        settings.delivery.url = Some(format!("{}/orders", self.target.uri()));
        settings.delivery.timeout_secs = 2;
        settings
    }
}

fn order_event(event_id: &str, order_id: u64) -> String {
    serde_json::json!({
        "event_id": event_id,
        "event_type": "order.paid",
        "timestamp": "2025-06-01T12:00:00Z",
        "order": {"id": order_id, "status": "paid"}
    })
    .to_string()
}

// =============================================================================
// Ingestion
// =============================================================================

#[tokio::test]
async fn test_sender_retries_are_idempotent() {
    let env = Env::start().await;
    let app = App::build(env.settings()).unwrap();
    let body = order_event("evt_100", 100);
    let now = Utc::now().timestamp();

    let first = app
        .receiver
        .receive(&env.signer.headers_at(now, body.as_bytes()), body.as_bytes())
        .await
        .unwrap();
    assert!(matches!(first, ReceiveOutcome::Accepted { .. }));

    // The upstream re-signs on retry.
    let retry = app
        .receiver
        .receive(&env.signer.headers_at(now - 1, body.as_bytes()), body.as_bytes())
        .await
        .unwrap();
    assert_eq!(
        retry,
        ReceiveOutcome::Duplicate {
            event_id: "evt_100".into()
        }
    );

    assert_eq!(app.events.len().await, 1);
    assert_eq!(app.queue.len().await, 1);
    assert!(app.audit.is_empty().await);
}

#[tokio::test]
async fn test_identical_resend_is_acknowledged() {
    let env = Env::start().await;
    let app = App::build(env.settings()).unwrap();
    assert!(app.settings.verifier.nonce_check);

    let body = order_event("evt_150", 150);
    let headers = env.signer.headers(body.as_bytes());

    let first = app.receiver.receive(&headers, body.as_bytes()).await.unwrap();
    assert!(matches!(first, ReceiveOutcome::Accepted { .. }));

    let resend = app.receiver.receive(&headers, body.as_bytes()).await.unwrap();
    assert_eq!(
        resend,
        ReceiveOutcome::Duplicate {
            event_id: "evt_150".into()
        }
    );

    assert_eq!(app.queue.len().await, 1);
    assert!(app.audit.is_empty().await);
}

#[tokio::test]
async fn test_signature_enforcement_is_audited() {
    let env = Env::start().await;
    let app = App::build(env.settings()).unwrap();
    let body = order_event("evt_200", 200);

    let unsigned = app
        .receiver
        .receive(&SignatureHeaders::default(), body.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(unsigned.status().as_u16(), 401);
    assert_eq!(unsigned.code(), "missing_signature");

    let headers = env.signer.headers(body.as_bytes());
    let tampered = body.replace("paid", "refunded");
    let forged = app
        .receiver
        .receive(&headers, tampered.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(forged.code(), "invalid_signature");

    let stale = env
        .signer
        .headers_at(Utc::now().timestamp() - 3600, body.as_bytes());
    let expired = app
        .receiver
        .receive(&stale, body.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(expired.code(), "timestamp_expired");

    let reasons: Vec<String> = app
        .audit
        .records()
        .await
        .into_iter()
        .map(|r| r.reason)
        .collect();
    assert_eq!(
        reasons,
        vec!["missing_signature", "invalid_signature", "timestamp_expired"]
    );
    assert!(app.events.is_empty().await);
    assert!(app.queue.is_empty().await);
}

/// Loses every event it is given, so only the replay guard can catch a resend.
struct ForgetfulEvents;

#[async_trait]
impl EventStore for ForgetfulEvents {
    async fn create(&self, _event: &WebhookEvent) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_event_id(&self, _event_id: &str) -> Result<Option<WebhookEvent>, StoreError> {
        Ok(None)
    }

    async fn mark_processed(&self, _event_id: &str, _at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_replayed_payload_is_rejected_by_fingerprint() {
    let signer = TestSigner::new("k1", 7);
    let queue = MemoryQueueStore::new();
    let audit = MemoryAuditStore::new();
    let receiver = WebhookReceiver::builder()
        .verifier(Arc::new(SignatureVerifier::without_keys(VerifierConfig {
            skip_verification: true,
            ..VerifierConfig::default()
        })))
        .replay_guard(ReplayGuard::new(
            Arc::new(MemoryReplayStore::new()),
            Duration::from_secs(600),
        ))
        .event_store(Arc::new(ForgetfulEvents))
        .queue_store(Arc::new(queue.clone()))
        .audit_store(Arc::new(audit.clone()))
        .build()
        .unwrap();

    let body = order_event("evt_300", 300);
    receiver
        .receive(&signer.headers(body.as_bytes()), body.as_bytes())
        .await
        .unwrap();

    let err = receiver
        .receive(&signer.headers(body.as_bytes()), body.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(err.status().as_u16(), 409);
    assert_eq!(err.code(), "replay_detected");
    assert_eq!(queue.len().await, 1);
    assert_eq!(audit.records().await[0].reason, "replay_detected");
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_accepted_event_is_delivered() {
    let env = Env::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("x-event-id", "evt_400"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&env.target)
        .await;

    let app = App::build(env.settings()).unwrap();
    let body = order_event("evt_400", 400);
    let ReceiveOutcome::Accepted { job_id, .. } = app
        .receiver
        .receive(&env.signer.headers(body.as_bytes()), body.as_bytes())
        .await
        .unwrap()
    else {
        panic!("expected acceptance");
    };

    let attempted = app
        .processor
        .process_once(app.sender.as_ref())
        .await
        .unwrap();
    assert_eq!(attempted, 1);

    let job = app.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processed);
    assert!(app.alerts.is_empty().await);
}

#[tokio::test]
async fn test_exhausted_delivery_alerts_once() {
    let env = Env::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&env.target)
        .await;

    let mut settings = env.settings();
    settings.queue.max_attempts = 3;
    let app = App::build(settings).unwrap();

    let body = order_event("evt_500", 500);
    let ReceiveOutcome::Accepted { job_id, .. } = app
        .receiver
        .receive(&env.signer.headers(body.as_bytes()), body.as_bytes())
        .await
        .unwrap()
    else {
        panic!("expected acceptance");
    };

    let mut now = Utc::now();
    for _ in 0..3 {
        assert_eq!(
            app.processor
                .process_once_at(now, app.sender.as_ref())
                .await
                .unwrap(),
            1
        );
        now = app.queue.get(job_id).await.unwrap().unwrap().next_retry_at;
    }

    let job = app.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(job.last_error.as_deref(), Some("unexpected status 503"));

    // Nothing is due once the job is terminal.
    let later = now + chrono::Duration::hours(2);
    assert_eq!(
        app.processor
            .process_once_at(later, app.sender.as_ref())
            .await
            .unwrap(),
        0
    );

    let alerts = app.alerts.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].event_id, "evt_500");
    assert_eq!(alerts[0].reason, "delivery_failed");
    assert_eq!(alerts[0].attempt_count, 2);

    assert_eq!(app.dead_letters.capture_failed().await.unwrap(), 1);
    let entries = app.dead_letters.list().await.unwrap();
    let replayed = app.dead_letters.replay(entries[0].id).await.unwrap();
    assert_eq!(replayed.status, JobStatus::Pending);
    assert_eq!(replayed.event_id, "evt_500");
}

// =============================================================================
// HTTP
// =============================================================================

#[tokio::test]
async fn test_serves_over_http_until_shutdown() {
    let env = Env::start().await;
    let app = App::build(env.settings()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);

    let events = app.events.clone();
    let running = tokio::spawn(async move { app.run(listener, false, rx).await });

    let body = order_event("evt_600", 600);
    let headers = env.signer.headers(body.as_bytes());
    let response = reqwest::Client::new()
        .post(format!("http://{}/ucp/v1/order-webhooks", addr))
        .header("UCP-Signature", headers.signature.unwrap())
        .header("UCP-Key-Id", headers.key_id.unwrap())
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(events.len().await, 1);

    let health = reqwest::get(format!("http://{}/healthz", addr)).await.unwrap();
    assert_eq!(health.status().as_u16(), 200);

    tx.send(true).unwrap();
    running.await.unwrap().unwrap();
}
