//! Configuration for the delivery sender and HTTP endpoint

use std::time::Duration;

/// Configuration for outbound deliveries
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Target URL. Deliveries fail with a configuration error while unset.
    pub url: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// User-Agent header for outgoing requests
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(5),
            user_agent: format!("orderhook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DeliveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DeliveryConfigBuilder {
        DeliveryConfigBuilder::new()
    }
}

/// Builder for DeliveryConfig
#[derive(Debug, Clone, Default)]
pub struct DeliveryConfigBuilder {
    config: DeliveryConfig,
}

impl DeliveryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
        }
    }

    /// Set the delivery URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Set the delivery URL if present
    pub fn maybe_url(mut self, url: Option<String>) -> Self {
        self.config.url = url;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> DeliveryConfig {
        self.config
    }
}

/// Inbound webhook path
pub const WEBHOOK_PATH: &str = "/ucp/v1/order-webhooks";

/// Health probe path
pub const HEALTH_PATH: &str = "/healthz";

/// Configuration for the HTTP endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
        }
    }
}
