//! Error types for webhook operations

use thiserror::Error;

/// Errors that can occur outside of request verification
#[derive(Error, Debug)]
pub enum WebhookError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Key-set endpoint answered with a non-success status
    #[error("Key-set fetch returned status {0}")]
    KeySetStatus(u16),

    /// Payload serialization/deserialization failed
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Server I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::PayloadError(err.to_string())
    }
}

/// Errors raised by event, replay and nonce stores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unique key already present
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Why a signed request was rejected.
///
/// Each variant has a stable machine code used in audit records and HTTP
/// responses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Signature header missing")]
    MissingSignature,

    #[error("Key ID header missing")]
    MissingKeyId,

    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    #[error("Timestamp outside tolerance: {age_secs}s (tolerance {tolerance_secs}s)")]
    TimestampExpired { age_secs: u64, tolerance_secs: u64 },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Signature does not match")]
    InvalidSignature,

    #[error("Signature already used")]
    SignatureReplayed,

    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("Verifier misconfigured: {0}")]
    Misconfigured(String),
}

impl VerificationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::MissingSignature => "missing_signature",
            VerificationError::MissingKeyId => "missing_key_id",
            VerificationError::MalformedSignature(_) => "malformed_signature",
            VerificationError::TimestampExpired { .. } => "timestamp_expired",
            VerificationError::KeyNotFound(_) => "key_not_found",
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::SignatureReplayed => "signature_replayed",
            VerificationError::KeySetUnavailable(_) => "key_set_unavailable",
            VerificationError::Misconfigured(_) => "verifier_misconfigured",
        }
    }

    /// Failures caused by our side rather than the sender (HTTP 500)
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            VerificationError::KeySetUnavailable(_) | VerificationError::Misconfigured(_)
        )
    }
}
