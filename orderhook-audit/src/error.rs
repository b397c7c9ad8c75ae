//! Audit and alert store errors

/// Errors raised by audit and alert stores
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation not supported")]
    NotSupported,

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;
