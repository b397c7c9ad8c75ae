//! Service assembly
//!
//! Builds every pipeline component from [`Settings`] and runs the HTTP
//! endpoint alongside the delivery worker.

use crate::error::AppResult;
use orderhook_audit::{
    AlertPolicy, AlertSink, AuditStore, FanoutAuditStore, FileAuditStore, MemoryAlertStore,
    MemoryAuditStore,
};
use orderhook_config::Settings;
use orderhook_queue::{
    BackoffPolicy, DeadLetterQueue, MemoryDeadLetterStore, MemoryQueueStore, Processor,
    ProcessorConfig, Worker, WorkerConfig,
};
use orderhook_webhooks::{
    DeliveryConfig, DeliverySender, HttpKeySetFetcher, KeySetCache, KeySetCacheConfig,
    MemoryEventStore, MemoryNonceStore, MemoryReplayStore, ReplayGuard, ServerConfig,
    SignatureVerifier, VerifierConfig, WebhookReceiver, WebhookServer,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// A fully wired pipeline.
///
/// Stores are in-process; their handles are exposed for inspection.
pub struct App {
    pub settings: Settings,
    pub receiver: Arc<WebhookReceiver>,
    pub server: Arc<WebhookServer>,
    pub processor: Arc<Processor>,
    pub sender: Arc<DeliverySender>,
    /// Operator access to failed jobs. Not exposed by the binary.
    pub dead_letters: DeadLetterQueue,
    pub events: MemoryEventStore,
    pub queue: MemoryQueueStore,
    pub audit: MemoryAuditStore,
    pub alerts: MemoryAlertStore,
}

impl App {
    pub fn build(settings: Settings) -> AppResult<Self> {
        let audit = MemoryAuditStore::new();
        let mut audit_sinks = FanoutAuditStore::new().with_store(Arc::new(audit.clone()));
        if let Some(path) = settings.audit.file.as_deref() {
            info!(target: "orderhook::app", path, "writing audit records to file");
            audit_sinks = audit_sinks.with_store(Arc::new(FileAuditStore::new(path)));
        }
        let audit_store: Arc<dyn AuditStore> = Arc::new(audit_sinks);

        let verifier = Arc::new(build_verifier(&settings)?);

        let events = MemoryEventStore::new();
        let queue = MemoryQueueStore::new();
        let receiver = Arc::new(
            WebhookReceiver::builder()
                .verifier(verifier)
                .replay_guard(ReplayGuard::new(
                    Arc::new(MemoryReplayStore::new()),
                    settings.replay.window(),
                ))
                .event_store(Arc::new(events.clone()))
                .queue_store(Arc::new(queue.clone()))
                .audit_store(audit_store)
                .build()?,
        );
        let server = Arc::new(WebhookServer::new(
            receiver.clone(),
            ServerConfig {
                max_body_bytes: settings.server.max_body_bytes,
            },
        ));

        if settings.delivery.url.is_none() {
            warn!(
                target: "orderhook::app",
                "no delivery URL configured; queued jobs will fail until one is set"
            );
        }
        let sender = Arc::new(DeliverySender::new(
            DeliveryConfig::builder()
                .maybe_url(settings.delivery.url.clone())
                .timeout(settings.delivery.timeout())
                .user_agent(settings.delivery.user_agent.clone())
                .build(),
        )?);

        let alerts = MemoryAlertStore::new();
        let alert_sink = AlertSink::new(
            Arc::new(alerts.clone()),
            AlertPolicy::new(settings.alerts.min_attempts, settings.alerts.dedupe_window()),
        );
        let processor = Arc::new(
            Processor::new(
                Arc::new(queue.clone()),
                ProcessorConfig {
                    batch_size: settings.queue.batch_size,
                    backoff: BackoffPolicy::new(
                        settings.queue.base_delay(),
                        settings.queue.max_attempts,
                    ),
                },
            )
            .with_observer(Arc::new(alert_sink)),
        );

        let dead_letters = DeadLetterQueue::new(
            Arc::new(queue.clone()),
            Arc::new(MemoryDeadLetterStore::new()),
        );

        Ok(Self {
            settings,
            receiver,
            server,
            processor,
            sender,
            dead_letters,
            events,
            queue,
            audit,
            alerts,
        })
    }

    /// A worker draining the queue through the delivery sender
    pub fn worker(&self) -> Worker {
        Worker::with_config(
            self.processor.clone(),
            self.sender.clone(),
            WorkerConfig {
                poll_interval: self.settings.queue.poll_interval(),
            },
        )
    }

    /// Serve on `listener` until `shutdown` flips to `true`.
    ///
    /// With `with_worker`, the delivery worker runs for the same lifetime.
    pub async fn run(
        &self,
        listener: TcpListener,
        with_worker: bool,
        shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let worker = with_worker.then(|| self.worker().spawn());
        if worker.is_none() {
            info!(target: "orderhook::app", "delivery worker disabled");
        }

        let served = self.server.clone().serve(listener, shutdown).await;

        if let Some(worker) = worker {
            worker.shutdown().await;
        }
        served?;
        Ok(())
    }
}

fn build_verifier(settings: &Settings) -> AppResult<SignatureVerifier> {
    let config = VerifierConfig {
        tolerance: settings.verifier.tolerance(),
        skip_verification: settings.verifier.skip_verification,
        nonce_ttl: settings.verifier.nonce_ttl(),
    };

    if config.skip_verification {
        warn!(
            target: "orderhook::app",
            "signature verification is DISABLED; every request will be accepted"
        );
    }

    let mut verifier = match settings.verifier.jwk_set_url.as_deref() {
        Some(url) => {
            let fetcher = HttpKeySetFetcher::new(url, settings.verifier.fetch_timeout())?;
            info!(target: "orderhook::app", url, "using remote key set");
            let cache = KeySetCache::new(
                Arc::new(fetcher),
                KeySetCacheConfig {
                    ttl: settings.verifier.cache_ttl(),
                    min_refresh_interval: settings.verifier.min_refresh_interval(),
                },
            );
            SignatureVerifier::new(Arc::new(cache), config)
        }
        None => SignatureVerifier::without_keys(config),
    };

    if settings.verifier.nonce_check {
        verifier = verifier.with_nonce_store(Arc::new(MemoryNonceStore::new()));
    }
    Ok(verifier)
}
