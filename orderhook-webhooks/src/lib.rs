//! Signed order-webhook ingestion and outbound delivery
//!
//! This crate handles both sides of the order-webhook pipeline: receiving
//! signed events from an upstream sender and delivering accepted payloads
//! to a downstream target.
//!
//! # Features
//!
//! - **Signature Verification**: ECDSA P-256 over `"<t>.<body>"`, keys from a remote JWK set
//! - **Key-Set Cache**: TTL cache with single-flight refresh and forced refresh on unknown key IDs
//! - **Replay Protection**: payload fingerprints and signature nonces with a time window
//! - **Idempotent Ingestion**: duplicate event IDs are acknowledged without side effects
//! - **Delivery Sender**: single-attempt HTTP POST used by the retry queue
//! - **HTTP Endpoint**: hyper server with body limits and a health probe
//!
//! # Example: Receiving Webhooks
//!
//! ```rust,no_run
//! use orderhook_audit::MemoryAuditStore;
//! use orderhook_queue::MemoryQueueStore;
//! use orderhook_webhooks::{
//!     HttpKeySetFetcher, KeySetCache, KeySetCacheConfig, MemoryEventStore, MemoryReplayStore,
//!     ReplayGuard, SignatureHeaders, SignatureVerifier, VerifierConfig, WebhookReceiver,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpKeySetFetcher::new(
//!     "https://platform.example.com/.well-known/jwks.json",
//!     Duration::from_secs(5),
//! )?;
//! let cache = Arc::new(KeySetCache::new(Arc::new(fetcher), KeySetCacheConfig::default()));
//!
//! let receiver = WebhookReceiver::builder()
//!     .verifier(Arc::new(SignatureVerifier::new(cache, VerifierConfig::default())))
//!     .replay_guard(ReplayGuard::new(
//!         Arc::new(MemoryReplayStore::new()),
//!         Duration::from_secs(600),
//!     ))
//!     .event_store(Arc::new(MemoryEventStore::new()))
//!     .queue_store(Arc::new(MemoryQueueStore::new()))
//!     .audit_store(Arc::new(MemoryAuditStore::new()))
//!     .build()?;
//!
//! let headers = SignatureHeaders::new("t=1700000000,v1=MEUCIQ...", "key-1");
//! let outcome = receiver.receive(&headers, br#"{"event_id":"evt_1","order":{"id":"1"}}"#).await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Delivering
//!
//! ```rust,no_run
//! use orderhook_webhooks::{DeliveryConfig, DeliverySender};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let sender = DeliverySender::new(
//!     DeliveryConfig::builder()
//!         .url("https://orders.internal/webhooks")
//!         .timeout_secs(5)
//!         .build(),
//! )?;
//! sender.send("evt_1", r#"{"event_id":"evt_1"}"#).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod error;
mod event;
mod keys;
mod nonce;
mod receiver;
mod replay;
mod sender;
mod server;
mod signature;
mod ttl;
mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{
    DEFAULT_KEY_SET_TTL, HttpKeySetFetcher, KeySetCache, KeySetCacheConfig, KeySetFetcher,
};
pub use config::{DeliveryConfig, DeliveryConfigBuilder, HEALTH_PATH, ServerConfig, WEBHOOK_PATH};
pub use error::{StoreError, VerificationError, WebhookError};
pub use event::{EventStatus, EventStore, MemoryEventStore, OrderEventFields, WebhookEvent, extract_event_id};
pub use keys::{Jwk, JwkSet, KeySet, SigningKey};
pub use nonce::{MemoryNonceStore, NonceStore, signature_nonce};
pub use receiver::{ReceiveError, ReceiveOutcome, WebhookReceiver, WebhookReceiverBuilder};
pub use replay::{DEFAULT_REPLAY_WINDOW, MemoryReplayStore, ReplayGuard, ReplayStore, fingerprint};
pub use sender::{DeliverySender, SendError};
pub use server::WebhookServer;
pub use signature::{SignatureHeader, headers, sha256_hex, signed_message};
pub use verifier::{SignatureHeaders, SignatureVerifier, Verified, VerifierConfig};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
