//! Streaming relay for Ollama-compatible generation backends.
//!
//! This crate opens one upstream generation call per request and turns the
//! chunked NDJSON body it returns into a uniform sequence of
//! [`StreamEvent`]s. It defines:
//!
//! - [`NdjsonNormalizer`] / [`NormalizedStream`] - line buffering and decoding
//!   of the upstream body
//! - [`OllamaClient`] - the HTTP calls to `/api/chat`, `/api/generate` and
//!   `/api/tags`
//! - [`Relay`] - mode dispatch (chat or vision) and stream setup
//! - [`RelayConfig`] - explicit configuration built once at startup
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use ollama_relay::{GenerationRequest, Relay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::new(RelayConfig::from_env()?)?;
//!     let mut events = relay.open(GenerationRequest::chat("Hello!")).await?;
//!     while let Some(event) = events.next().await {
//!         print!("{}", event.to_line());
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod event;
mod normalizer;
mod relay;
mod types;
mod upstream;

pub use config::{RelayConfig, RelayConfigBuilder};
pub use error::{RelayError, Result};
pub use event::StreamEvent;
pub use normalizer::{NdjsonNormalizer, NormalizedStream, MAX_LINE_BYTES};
pub use relay::{EventStream, Relay};
pub use types::{
    ChatMessage, GenerationRequest, RelayMode, Role, DEFAULT_FREE_MODEL, VISION_MODEL,
};
pub use upstream::{ByteStream, OllamaClient};
