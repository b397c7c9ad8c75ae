//! Operator alert records and storage

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// An operator-visible alert about repeated delivery failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub event_id: String,
    pub reason: String,
    pub details: String,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(
        event_id: impl Into<String>,
        reason: impl Into<String>,
        details: impl Into<String>,
        attempt_count: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            reason: reason.into(),
            details: details.into(),
            attempt_count,
            created_at,
        }
    }
}

/// Alert persistence
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(&self, alert: &AlertRecord) -> Result<()>;

    /// Whether an alert for `(event_id, reason)` was created after `since`.
    async fn exists_recent(&self, event_id: &str, reason: &str, since: DateTime<Utc>)
    -> Result<bool>;
}

/// In-process alert store.
#[derive(Clone, Default)]
pub struct MemoryAlertStore {
    alerts: Arc<Mutex<Vec<AlertRecord>>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.alerts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.lock().await.is_empty()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn create(&self, alert: &AlertRecord) -> Result<()> {
        self.alerts.lock().await.push(alert.clone());
        Ok(())
    }

    async fn exists_recent(
        &self,
        event_id: &str,
        reason: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let alerts = self.alerts.lock().await;
        Ok(alerts
            .iter()
            .any(|a| a.event_id == event_id && a.reason == reason && a.created_at > since))
    }
}
