//! Signature nonce store
//!
//! Rejects reuse of an exact `(signature header, key id)` pair, independent
//! of the payload-level replay guard.

use crate::StoreError;
use crate::signature::sha256_hex;
use crate::ttl::ExpiringSet;
use async_trait::async_trait;
use std::time::Duration;

/// Nonce derived from a signature header and key ID
pub fn signature_nonce(signature_header: &str, key_id: &str) -> String {
    sha256_hex(format!("{}|{}", signature_header, key_id).as_bytes())
}

#[async_trait]
pub trait NonceStore: Send + Sync {
    async fn seen(&self, nonce: &str) -> Result<bool, StoreError>;

    async fn mark(&self, nonce: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Mark unless already seen, in one step. Returns `true` if newly marked.
    ///
    /// The default falls back to `seen` + `mark` and is not atomic.
    async fn try_mark(&self, nonce: &str, ttl: Duration) -> Result<bool, StoreError> {
        if self.seen(nonce).await? {
            return Ok(false);
        }
        self.mark(nonce, ttl).await?;
        Ok(true)
    }
}

/// In-process nonce store.
#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    set: ExpiringSet,
}

impl MemoryNonceStore {
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
impl NonceStore for MemoryNonceStore {
    async fn seen(&self, nonce: &str) -> Result<bool, StoreError> {
        Ok(self.set.contains(nonce).await)
    }

    async fn mark(&self, nonce: &str, ttl: Duration) -> Result<(), StoreError> {
        self.set.insert(nonce, ttl).await;
        Ok(())
    }

    async fn try_mark(&self, nonce: &str, ttl: Duration) -> Result<bool, StoreError> {
        Ok(self.set.insert_if_absent(nonce, ttl).await)
    }
}
