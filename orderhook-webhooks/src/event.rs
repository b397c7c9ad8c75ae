//! Accepted webhook events

use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Persisted; its delivery job may not exist yet
    Received,
    /// Delivery job enqueued
    Processed,
}

/// One accepted business event. `event_id` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: Option<String>,
    pub order_id: String,
    pub status: EventStatus,
    pub payload_fingerprint: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fields the receiver needs from an order webhook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEventFields {
    pub event_id: String,
    pub event_type: Option<String>,
    pub order_id: String,
    pub order_status: Option<String>,
}

impl OrderEventFields {
    /// `None` when `event_id` or `order.id` is missing or empty
    pub fn from_json(value: &Value) -> Option<Self> {
        let event_id = scalar_string(value.get("event_id")?)?;
        let order = value.get("order")?;
        let order_id = scalar_string(order.get("id")?)?;

        Some(Self {
            event_id,
            event_type: value.get("event_type").and_then(scalar_string),
            order_id,
            order_status: order.get("status").and_then(scalar_string),
        })
    }
}

/// Best-effort event ID for audit records, from a body that may be invalid
pub fn extract_event_id(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    scalar_string(value.get("event_id")?)
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert; [`StoreError::Duplicate`] if the event ID exists.
    async fn create(&self, event: &WebhookEvent) -> Result<(), StoreError>;

    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEvent>, StoreError>;

    /// Set status to processed; [`StoreError::NotFound`] if the event is unknown.
    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// In-process event store.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<RwLock<HashMap<String, WebhookEvent>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn create(&self, event: &WebhookEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.event_id) {
            return Err(StoreError::Duplicate(event.event_id.clone()));
        }
        events.insert(event.event_id.clone(), event.clone());
        Ok(())
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEvent>, StoreError> {
        Ok(self.events.read().await.get(event_id).cloned())
    }

    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound(event_id.to_string()))?;
        event.status = EventStatus::Processed;
        event.processed_at = Some(at);
        Ok(())
    }
}
