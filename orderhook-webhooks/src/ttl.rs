// In-memory set of keys that expire

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct ExpiringSet {
    entries: Mutex<HashMap<String, Instant>>,
}

impl ExpiringSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }

    pub(crate) async fn insert(&self, key: &str, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, expires_at| *expires_at > now);
        entries.insert(key.to_string(), now + ttl);
    }

    /// Insert unless a live entry exists. Returns `true` if inserted.
    pub(crate) async fn insert_if_absent(&self, key: &str, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, expires_at| *expires_at > now);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), now + ttl);
        true
    }

    pub(crate) async fn remove(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    pub(crate) async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }
}
