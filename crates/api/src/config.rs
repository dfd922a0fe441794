//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

use ollama_relay::{RelayConfig, RelayError};
use subscription::{BillingError, StripeConfig};
use web_search::SearchConfig;

use crate::auth::AuthConfig;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Bearer token required by the admin override endpoint.
    pub admin_token: String,
    /// Reject non-pro callers asking for anything but the free model.
    pub enforce_model_access: bool,
    pub relay: RelayConfig,
    pub stripe: StripeConfig,
    pub auth: AuthConfig,
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `API_ADDR` | Server bind address | `127.0.0.1:8787` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:assistant.db?mode=rwc` |
    /// | `ADMIN_API_TOKEN` | Admin bearer token | (required) |
    /// | `ENFORCE_MODEL_ACCESS` | Gate non-free models by plan | `false` |
    /// | `OLLAMA_*` | See [`RelayConfig::from_env`] | |
    /// | `STRIPE_*` | See [`StripeConfig::from_env`] | |
    /// | `AUTH_URL`, `AUTH_API_KEY` | Identity provider | (required) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:assistant.db?mode=rwc".to_string());

        let admin_token = env::var("ADMIN_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("ADMIN_API_TOKEN"))?;

        let enforce_model_access = env::var("ENFORCE_MODEL_ACCESS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            addr,
            database_url,
            admin_token,
            enforce_model_access,
            relay: RelayConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            search: SearchConfig::default(),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API_ADDR format")]
    InvalidAddr,

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Billing(#[from] BillingError),
}
