//! Configuration for the relay.

use std::env;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::types::DEFAULT_FREE_MODEL;

/// Configuration for [`crate::Relay`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the Ollama-compatible backend.
    pub base_url: String,

    /// Model used when a conversation request names none.
    pub default_model: String,

    /// Honor a per-request base URL instead of `base_url`.
    pub allow_base_url_override: bool,

    /// Longest wait for the next upstream fragment before failing the stream.
    pub idle_timeout: Duration,

    /// Timeout for establishing the upstream connection.
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            default_model: DEFAULT_FREE_MODEL.to_string(),
            allow_base_url_override: false,
            idle_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OLLAMA_BASE_URL` - Base URL of the generation backend
    ///
    /// Optional environment variables:
    /// - `OLLAMA_DEFAULT_MODEL` - Conversation model (default: FireFlies:latest)
    /// - `OLLAMA_ALLOW_BASE_URL_OVERRIDE` - Accept `baseUrl` from callers (default: false)
    /// - `OLLAMA_IDLE_TIMEOUT_SECS` - Idle read timeout (default: 120)
    /// - `OLLAMA_CONNECT_TIMEOUT_SECS` - Connect timeout (default: 10)
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("OLLAMA_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RelayError::Configuration("OLLAMA_BASE_URL not set".to_string()))?;

        let default_model =
            env::var("OLLAMA_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_FREE_MODEL.to_string());

        let allow_base_url_override = env::var("OLLAMA_ALLOW_BASE_URL_OVERRIDE")
            .ok()
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let idle_timeout = env::var("OLLAMA_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));

        let connect_timeout = env::var("OLLAMA_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
            allow_base_url_override,
            idle_timeout,
            connect_timeout,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }
}

/// Builder for RelayConfig.
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Set the backend base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default conversation model.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    /// Accept per-request base URLs.
    pub fn allow_base_url_override(mut self, allow: bool) -> Self {
        self.config.allow_base_url_override = allow;
        self
    }

    /// Set the idle read timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RelayConfig {
        self.config
    }
}
