//! Key-set cache
//!
//! Owns its lock and TTL. Many verifications read concurrently; a refresh
//! takes the write lock, so concurrent misses trigger a single fetch.

use crate::keys::{JwkSet, KeySet, SigningKey};
use crate::{VerificationError, WebhookError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default TTL for a fetched key set (10 minutes).
pub const DEFAULT_KEY_SET_TTL: Duration = Duration::from_secs(600);

/// Source of the remote key set
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, WebhookError>;
}

/// Fetches the key set over HTTP with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpKeySetFetcher {
    url: url::Url,
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url::Url::parse(url)?,
            client,
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self) -> Result<JwkSet, WebhookError> {
        let response = self.client.get(self.url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(WebhookError::KeySetStatus(response.status().as_u16()));
        }

        Ok(response.json::<JwkSet>().await?)
    }
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Cache tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySetCacheConfig {
    pub ttl: Duration,
    /// Minimum gap between refreshes forced by an unknown key ID
    pub min_refresh_interval: Duration,
}

impl Default for KeySetCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_KEY_SET_TTL,
            min_refresh_interval: Duration::from_secs(30),
        }
    }
}

/// TTL cache of the trusted key set.
pub struct KeySetCache {
    fetcher: Arc<dyn KeySetFetcher>,
    config: KeySetCacheConfig,
    state: RwLock<Option<CachedKeySet>>,
}

impl KeySetCache {
    pub fn new(fetcher: Arc<dyn KeySetFetcher>, config: KeySetCacheConfig) -> Self {
        Self {
            fetcher,
            config,
            state: RwLock::new(None),
        }
    }

    /// Look up a key, refreshing the set when expired.
    ///
    /// An unknown key ID in a fresh set forces one refresh, rate limited by
    /// `min_refresh_interval`. Returns [`VerificationError::KeyNotFound`] if
    /// the key is still absent.
    pub async fn get(&self, kid: &str) -> Result<SigningKey, VerificationError> {
        let seen_at = {
            let state = self.state.read().await;
            match state.as_ref() {
                Some(cached) if !self.is_expired(cached) => {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    if cached.fetched_at.elapsed() < self.config.min_refresh_interval {
                        return Err(VerificationError::KeyNotFound(kid.to_string()));
                    }
                    debug!(target: "orderhook::keys", kid = %kid, "unknown key id, refreshing");
                    Some(cached.fetched_at)
                }
                Some(cached) => Some(cached.fetched_at),
                None => None,
            }
        };

        let keys = self.refresh_if_unchanged(seen_at).await?;
        keys.get(kid)
            .cloned()
            .ok_or_else(|| VerificationError::KeyNotFound(kid.to_string()))
    }

    /// Fetch now, replacing the cached set.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, VerificationError> {
        let mut state = self.state.write().await;
        self.fetch_into(&mut state).await
    }

    /// Drop the cached set.
    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }

    /// Number of usable keys currently cached
    pub async fn key_count(&self) -> usize {
        self.state
            .read()
            .await
            .as_ref()
            .map(|c| c.keys.len())
            .unwrap_or(0)
    }

    fn is_expired(&self, cached: &CachedKeySet) -> bool {
        cached.fetched_at.elapsed() >= self.config.ttl
    }

    // Another task may have refreshed while we waited for the write lock;
    // reuse its result instead of fetching again.
    async fn refresh_if_unchanged(
        &self,
        seen_at: Option<Instant>,
    ) -> Result<Arc<KeySet>, VerificationError> {
        let mut state = self.state.write().await;
        if let Some(cached) = state.as_ref() {
            if Some(cached.fetched_at) != seen_at && !self.is_expired(cached) {
                return Ok(cached.keys.clone());
            }
        }
        self.fetch_into(&mut state).await
    }

    async fn fetch_into(
        &self,
        state: &mut Option<CachedKeySet>,
    ) -> Result<Arc<KeySet>, VerificationError> {
        let jwks = self.fetcher.fetch().await.map_err(|e| {
            warn!(target: "orderhook::keys", error = %e, "key-set fetch failed");
            VerificationError::KeySetUnavailable(e.to_string())
        })?;

        let keys = Arc::new(KeySet::from_jwks(&jwks));
        info!(
            target: "orderhook::keys",
            published = jwks.keys.len(),
            usable = keys.len(),
            "key set refreshed"
        );

        *state = Some(CachedKeySet {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}
