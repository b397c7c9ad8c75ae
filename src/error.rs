//! Error types for the orderhook service.

use thiserror::Error;

/// Result type for service wiring and startup.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised while assembling or running the service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Settings could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] orderhook_config::ConfigError),

    /// A webhook component could not be built
    #[error("Webhook error: {0}")]
    Webhook(#[from] orderhook_webhooks::WebhookError),

    /// Listener or signal handling failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
