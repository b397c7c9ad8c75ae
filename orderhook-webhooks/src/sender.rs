//! Delivery sender
//!
//! One outbound POST per call. Retries belong to the queue processor.

use crate::config::DeliveryConfig;
use crate::signature::headers;
use crate::WebhookError;
use async_trait::async_trait;
use orderhook_queue::{Deliverer, QueueError, QueueJob, QueueResult};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single delivery attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("delivery URL is not configured")]
    MissingDeliveryUrl,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Transport(err.to_string())
        }
    }
}

/// HTTP sender for accepted payloads
#[derive(Debug, Clone)]
pub struct DeliverySender {
    config: DeliveryConfig,
    http_client: Client,
}

impl DeliverySender {
    pub fn new(config: DeliveryConfig) -> Result<Self, WebhookError> {
        if let Some(url) = &config.url {
            url::Url::parse(url)?;
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// POST `payload` to the delivery URL. Any 2xx is success.
    pub async fn send(&self, event_id: &str, payload: &str) -> Result<(), SendError> {
        let url = self
            .config
            .url
            .as_deref()
            .ok_or(SendError::MissingDeliveryUrl)?;

        debug!(target: "orderhook::sender", event_id, url, "sending delivery");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .header(headers::EVENT_ID, event_id)
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "orderhook::sender",
                event_id,
                status = status.as_u16(),
                "delivery rejected by target"
            );
            return Err(SendError::UnexpectedStatus(status.as_u16()));
        }

        info!(target: "orderhook::sender", event_id, status = status.as_u16(), "delivered");
        Ok(())
    }
}

#[async_trait]
impl Deliverer for DeliverySender {
    async fn deliver(&self, job: &QueueJob) -> QueueResult<()> {
        self.send(&job.event_id, &job.payload)
            .await
            .map_err(|e| QueueError::Delivery(e.to_string()))
    }
}
