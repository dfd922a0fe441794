//! Per-request orchestration of upstream call and normalization.

use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::normalizer::NormalizedStream;
use crate::types::{GenerationRequest, RelayMode};
use crate::upstream::{ByteStream, OllamaClient};

/// The live event stream returned to a caller.
pub type EventStream = NormalizedStream<ByteStream>;

/// Relays generation requests to the upstream backend.
///
/// `Relay` holds no per-request state; each call to [`Relay::open`] owns its
/// own upstream connection and line buffer.
#[derive(Debug, Clone)]
pub struct Relay {
    upstream: OllamaClient,
    config: RelayConfig,
}

impl Relay {
    /// Create a new relay with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let upstream = OllamaClient::new(&config)?;

        info!(
            "Relay initialized with backend: {}, default model: {}",
            config.base_url, config.default_model
        );

        Ok(Self { upstream, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Open one upstream generation call and return its normalized events.
    ///
    /// Errors returned here happen before any byte was received (missing
    /// prompt, connection failure, non-success status). Failures after that
    /// point arrive as a terminal [`crate::StreamEvent::Error`].
    pub async fn open(&self, request: GenerationRequest) -> Result<EventStream> {
        let base_url = self.resolve_base_url(request.base_url.as_deref()).to_string();
        let mode = request.into_mode(&self.config.default_model)?;

        let body = match &mode {
            RelayMode::Chat { model, messages } => {
                self.upstream.chat(&base_url, model, messages).await?
            }
            RelayMode::Vision {
                model,
                prompt,
                image,
            } => {
                self.upstream
                    .generate_vision(&base_url, model, prompt, image)
                    .await?
            }
        };

        Ok(NormalizedStream::new(body))
    }

    /// List the models installed on the backend.
    pub async fn list_models(&self, base_url: Option<&str>) -> Result<Vec<serde_json::Value>> {
        let base_url = self.resolve_base_url(base_url).to_string();
        self.upstream.list_models(&base_url).await
    }

    fn resolve_base_url<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) if self.config.allow_base_url_override => url,
            Some(url) => {
                warn!("Ignoring caller base URL {}: overrides are disabled", url);
                &self.config.base_url
            }
            None => &self.config.base_url,
        }
    }
}
