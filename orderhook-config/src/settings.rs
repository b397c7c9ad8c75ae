// Typed service settings

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigLoader, EnvLoader, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Top-level settings for the orderhook service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub verifier: VerifierSettings,
    pub replay: ReplaySettings,
    pub queue: QueueSettings,
    pub delivery: DeliverySettings,
    pub alerts: AlertSettings,
    pub audit: AuditSettings,
}

/// Inbound HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Signature verification and key-set caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerifierSettings {
    pub jwk_set_url: Option<String>,
    pub tolerance_secs: u64,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub min_refresh_interval_secs: u64,
    /// Accept every request without checking signatures. Test harnesses only.
    pub skip_verification: bool,
    pub nonce_check: bool,
    pub nonce_ttl_secs: u64,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            jwk_set_url: None,
            tolerance_secs: 300,
            cache_ttl_secs: 600,
            fetch_timeout_secs: 5,
            min_refresh_interval_secs: 30,
            skip_verification: false,
            nonce_check: true,
            nonce_ttl_secs: 600,
        }
    }
}

impl VerifierSettings {
    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_ttl_secs)
    }
}

/// Payload replay window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplaySettings {
    pub window_secs: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self { window_secs: 600 }
    }
}

impl ReplaySettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Retry queue processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_attempts: 5,
            base_delay_secs: 60,
            poll_interval_secs: 2,
        }
    }
}

impl QueueSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Outbound delivery target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliverySettings {
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 5,
            user_agent: format!("orderhook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DeliverySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Operator alert policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertSettings {
    pub min_attempts: u32,
    pub dedupe_window_secs: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            min_attempts: 2,
            dedupe_window_secs: 3600,
        }
    }
}

impl AlertSettings {
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_secs(self.dedupe_window_secs)
    }
}

/// Audit trail sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditSettings {
    /// Append-only JSON-lines file, in addition to the in-process store
    pub file: Option<String>,
}

impl Settings {
    /// Load settings from an optional file, `.env`, and the process environment.
    ///
    /// Precedence, lowest first: defaults, file, environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with_vars(path, std::env::vars())
    }

    /// Load settings using an explicit set of environment variables.
    pub fn load_with_vars<I>(path: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tree = match path {
            Some(path) => ConfigLoader::auto(path)?.load_file(path)?,
            None => Value::Object(Default::default()),
        };

        let overrides = EnvLoader::default().load_from(vars);
        EnvLoader::apply(&mut tree, overrides);

        let settings: Settings = serde_json::from_value(tree)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.server.host, "server.host")?;
        ConfigValidator::is_port(self.server.port, "server.port")?;
        ConfigValidator::at_least(self.server.max_body_bytes, 1, "server.max_body_bytes")?;

        if !self.verifier.skip_verification {
            match self.verifier.jwk_set_url.as_deref() {
                Some(url) => ConfigValidator::is_url(url, "verifier.jwk_set_url")?,
                None => {
                    return Err(ConfigError::ValidationError(
                        "verifier.jwk_set_url is required unless verifier.skip_verification is set"
                            .to_string(),
                    ));
                }
            }
        }
        ConfigValidator::at_least(self.verifier.cache_ttl_secs, 1, "verifier.cache_ttl_secs")?;
        ConfigValidator::at_least(
            self.verifier.fetch_timeout_secs,
            1,
            "verifier.fetch_timeout_secs",
        )?;

        ConfigValidator::at_least(self.replay.window_secs, 1, "replay.window_secs")?;

        ConfigValidator::at_least(self.queue.batch_size, 1, "queue.batch_size")?;
        ConfigValidator::at_least(self.queue.max_attempts, 1, "queue.max_attempts")?;
        ConfigValidator::at_least(self.queue.base_delay_secs, 1, "queue.base_delay_secs")?;

        if let Some(url) = self.delivery.url.as_deref() {
            ConfigValidator::is_url(url, "delivery.url")?;
        }
        ConfigValidator::at_least(self.delivery.timeout_secs, 1, "delivery.timeout_secs")?;

        if let Some(file) = self.audit.file.as_deref() {
            ConfigValidator::not_empty(file, "audit.file")?;
        }

        Ok(())
    }
}
