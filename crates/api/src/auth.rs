//! Caller identity from the hosted auth service.

use std::env;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use reqwest::Client;
use serde::Deserialize;
use subscription::UserIdentity;
use thiserror::Error;

use crate::config::ConfigError;

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL; users are resolved at `{url}/auth/v1/user`.
    pub url: String,
    /// Project key sent as the `apikey` header.
    pub api_key: String,
}

impl AuthConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Requires `AUTH_URL` and `AUTH_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("AUTH_URL").map_err(|_| ConfigError::Missing("AUTH_URL"))?;
        let api_key = env::var("AUTH_API_KEY").map_err(|_| ConfigError::Missing("AUTH_API_KEY"))?;
        Ok(Self::new(url, api_key))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider refused the token.
    #[error("Authentication error: {0}")]
    Rejected(String),

    #[error("Auth service unreachable: {0}")]
    Network(String),
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Resolves bearer tokens to users.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    config: AuthConfig,
}

impl AuthClient {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Look up the user a token belongs to.
    pub async fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let url = format!("{}/auth/v1/user", self.config.url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{} {}", status.as_u16(), body)));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Rejected(format!("invalid user response: {}", e)))?;

        Ok(UserIdentity {
            user_id: user.id,
            email: user.email.filter(|email| !email.is_empty()),
        })
    }
}

/// The token of an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}
