//! HTTP client for the Ollama-compatible generation backend.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::Stream;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::types::ChatMessage;

/// Raw upstream response body, one fragment per item.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

impl GenerateOptions {
    fn vision() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

/// Client for `/api/chat`, `/api/generate` and `/api/tags`.
///
/// Every call is made exactly once; failures are reported, never retried.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    idle_timeout: Duration,
}

impl OllamaClient {
    /// Create a new client from relay configuration.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            idle_timeout: config.idle_timeout,
        })
    }

    /// Start a streaming conversation.
    pub async fn chat(
        &self,
        base_url: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ByteStream> {
        let url = endpoint(base_url, "api/chat");
        info!("Making chat request to {} with model: {}", url, model);

        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };
        self.open_stream(&url, &request).await
    }

    /// Start a streaming vision generation for one prompt and one base64 image.
    pub async fn generate_vision(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        image: &str,
    ) -> Result<ByteStream> {
        let url = endpoint(base_url, "api/generate");
        info!("Making vision request to {} with model: {}", url, model);

        let request = GenerateRequest {
            model,
            prompt,
            images: vec![image],
            stream: true,
            options: GenerateOptions::vision(),
        };
        self.open_stream(&url, &request).await
    }

    /// List the models installed on the backend.
    pub async fn list_models(&self, base_url: &str) -> Result<Vec<serde_json::Value>> {
        let url = endpoint(base_url, "api/tags");
        debug!("Fetching available models from {}", url);

        let response = self.send(self.http.get(&url)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;

        info!("Models fetched: {}", tags.models.len());
        Ok(tags.models)
    }

    async fn open_stream<T: Serialize>(&self, url: &str, body: &T) -> Result<ByteStream> {
        let request = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        let response = self.send(request).await.map_err(|e| {
            error!("Failed to reach upstream {}: {}", url, e);
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ollama API error: {} {}", status.as_u16(), body);
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let idle_timeout = self.idle_timeout;
        let fragments = response
            .bytes_stream()
            .timeout(idle_timeout)
            .map(move |item| match item {
                Ok(Ok(fragment)) => Ok(fragment),
                Ok(Err(e)) => Err(RelayError::Network(e.to_string())),
                Err(_) => Err(RelayError::IdleTimeout(idle_timeout)),
            });

        Ok(Box::pin(fragments))
    }

    /// Send a request, waiting at most the idle timeout for response headers.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        match tokio::time::timeout(self.idle_timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(RelayError::Network(e.to_string())),
            Err(_) => Err(RelayError::IdleTimeout(self.idle_timeout)),
        }
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}
