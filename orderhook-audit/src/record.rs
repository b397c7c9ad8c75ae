//! Audit records for rejected inbound webhooks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rejected ingestion attempt.
///
/// Written once for every verification or replay failure and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record ID
    pub id: String,

    /// Business event ID, when the body could be parsed far enough to find one
    pub event_id: Option<String>,

    /// Machine-readable rejection reason (e.g. `invalid_signature`)
    pub reason: String,

    /// Raw signature header as received
    pub signature_header: Option<String>,

    /// Key ID header as received
    pub key_id: Option<String>,

    /// Hex SHA-256 of the raw request body
    pub payload_fingerprint: String,

    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a new audit record
    ///
    /// # Examples
    ///
    /// ```
    /// use orderhook_audit::AuditRecord;
    ///
    /// let record = AuditRecord::new("invalid_signature", "9f86d081")
    ///     .event_id("evt_1")
    ///     .key_id("key-2024-01");
    /// assert_eq!(record.reason, "invalid_signature");
    /// ```
    pub fn new(reason: impl Into<String>, payload_fingerprint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: None,
            reason: reason.into(),
            signature_header: None,
            key_id: None,
            payload_fingerprint: payload_fingerprint.into(),
            created_at: Utc::now(),
        }
    }

    /// Set the associated event ID
    pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Set the event ID if one was recovered
    pub fn maybe_event_id(mut self, event_id: Option<String>) -> Self {
        self.event_id = event_id;
        self
    }

    /// Set the signature header value
    pub fn signature_header(mut self, header: impl Into<String>) -> Self {
        self.signature_header = Some(header.into());
        self
    }

    /// Set the key ID
    pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Override the creation time
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
