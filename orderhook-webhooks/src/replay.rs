//! Payload replay guard
//!
//! Remembers the SHA-256 fingerprint of every accepted body for a window and
//! rejects byte-identical resubmissions, whatever their event ID.

use crate::StoreError;
use crate::signature::sha256_hex;
use crate::ttl::ExpiringSet;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default replay window (10 minutes).
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(600);

/// Payload fingerprint: hex SHA-256 of the raw body
pub fn fingerprint(body: &[u8]) -> String {
    sha256_hex(body)
}

#[async_trait]
pub trait ReplayStore: Send + Sync {
    async fn seen(&self, fingerprint: &str) -> Result<bool, StoreError>;

    async fn mark(&self, fingerprint: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Forget a fingerprint before its window ends.
    async fn unmark(&self, fingerprint: &str) -> Result<(), StoreError>;

    /// Check and mark in one step. Returns `true` if the fingerprint was new.
    ///
    /// The default falls back to `seen` + `mark` and is not atomic.
    async fn try_mark(&self, fingerprint: &str, ttl: Duration) -> Result<bool, StoreError> {
        if self.seen(fingerprint).await? {
            return Ok(false);
        }
        self.mark(fingerprint, ttl).await?;
        Ok(true)
    }
}

/// In-process replay store.
#[derive(Debug, Default)]
pub struct MemoryReplayStore {
    set: ExpiringSet,
}

impl MemoryReplayStore {
    pub fn new() -> Self {
        Self {
            set: ExpiringSet::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.set.len().await
    }
}

#[async_trait]
impl ReplayStore for MemoryReplayStore {
    async fn seen(&self, fingerprint: &str) -> Result<bool, StoreError> {
        Ok(self.set.contains(fingerprint).await)
    }

    async fn mark(&self, fingerprint: &str, ttl: Duration) -> Result<(), StoreError> {
        self.set.insert(fingerprint, ttl).await;
        Ok(())
    }

    async fn unmark(&self, fingerprint: &str) -> Result<(), StoreError> {
        self.set.remove(fingerprint).await;
        Ok(())
    }

    async fn try_mark(&self, fingerprint: &str, ttl: Duration) -> Result<bool, StoreError> {
        Ok(self.set.insert_if_absent(fingerprint, ttl).await)
    }
}

/// Replay check bound to a window
#[derive(Clone)]
pub struct ReplayGuard {
    store: Arc<dyn ReplayStore>,
    window: Duration,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn ReplayStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record `fingerprint`; `false` if it was already seen within the window.
    pub async fn check_and_mark(&self, fingerprint: &str) -> Result<bool, StoreError> {
        self.store.try_mark(fingerprint, self.window).await
    }

    pub async fn seen(&self, fingerprint: &str) -> Result<bool, StoreError> {
        self.store.seen(fingerprint).await
    }

    /// Undo [`check_and_mark`](Self::check_and_mark) for a payload that was
    /// never persisted.
    pub async fn release(&self, fingerprint: &str) -> Result<(), StoreError> {
        self.store.unmark(fingerprint).await
    }
}
