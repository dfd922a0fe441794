//! Billing provider lookups.
//!
//! [`StripeBilling`] talks to the Stripe REST API directly with a bearer
//! secret key. Only two reads are needed: the first customer for an email,
//! and that customer's first active subscription.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::reconcile::{ActiveSubscription, BillingLookup};

/// Default Stripe API base URL.
pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

/// Errors from the billing provider.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("network error: {0}")]
    Network(String),

    #[error("billing API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid billing response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// A customer at the billing provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingCustomer {
    pub id: String,
}

/// Read access to the billing provider.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// The first customer registered with this email.
    async fn find_customer(&self, email: &str) -> Result<Option<BillingCustomer>, BillingError>;

    /// The first active subscription of a customer.
    async fn active_subscription(
        &self,
        customer_id: &str,
    ) -> Result<Option<ActiveSubscription>, BillingError>;

    /// Everything reconciliation needs to know about an email.
    async fn lookup(&self, email: &str) -> Result<BillingLookup, BillingError> {
        let Some(customer) = self.find_customer(email).await? else {
            return Ok(BillingLookup::NoCustomer);
        };
        let active = self.active_subscription(&customer.id).await?;
        Ok(BillingLookup::Customer {
            id: customer.id,
            active,
        })
    }
}

/// Configuration for [`StripeBilling`].
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_STRIPE_API_URL.to_string(),
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Load from the environment.
    ///
    /// - `STRIPE_SECRET_KEY` (required)
    /// - `STRIPE_API_URL` (optional, defaults to the public API)
    pub fn from_env() -> Result<Self, BillingError> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                BillingError::Configuration("STRIPE_SECRET_KEY is not set".to_string())
            })?;

        let mut config = Self::new(secret_key);
        if let Ok(api_url) = std::env::var("STRIPE_API_URL") {
            if !api_url.trim().is_empty() {
                config.api_url = api_url;
            }
        }
        Ok(config)
    }
}

/// Stripe-backed [`BillingProvider`].
#[derive(Debug, Clone)]
pub struct StripeBilling {
    http: Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<ListResponse<SubscriptionItem>>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

impl SubscriptionObject {
    /// Newer API versions only carry the period end on the items.
    fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .as_ref()
                .and_then(|items| items.data.iter().find_map(|i| i.current_period_end))
        })
    }
}

impl StripeBilling {
    pub fn new(config: StripeConfig) -> Result<Self, BillingError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BillingError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, BillingError> {
        Self::new(StripeConfig::from_env()?)
    }

    async fn list<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, BillingError> {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| BillingError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| BillingError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(list.data)
    }
}

#[async_trait]
impl BillingProvider for StripeBilling {
    async fn find_customer(&self, email: &str) -> Result<Option<BillingCustomer>, BillingError> {
        let customers: Vec<CustomerObject> = self
            .list("/v1/customers", &[("email", email), ("limit", "1")])
            .await?;

        let customer = customers
            .into_iter()
            .next()
            .map(|c| BillingCustomer { id: c.id });
        debug!("Billing customer for {}: {:?}", email, customer);
        Ok(customer)
    }

    async fn active_subscription(
        &self,
        customer_id: &str,
    ) -> Result<Option<ActiveSubscription>, BillingError> {
        let subscriptions: Vec<SubscriptionObject> = self
            .list(
                "/v1/subscriptions",
                &[("customer", customer_id), ("status", "active"), ("limit", "1")],
            )
            .await?;

        let Some(subscription) = subscriptions.into_iter().next() else {
            return Ok(None);
        };

        let period_end = subscription.period_end().ok_or_else(|| {
            BillingError::InvalidResponse(format!(
                "subscription {} has no current_period_end",
                subscription.id
            ))
        })?;
        let current_period_end = DateTime::<Utc>::from_timestamp(period_end, 0).ok_or_else(|| {
            BillingError::InvalidResponse(format!("period end out of range: {}", period_end))
        })?;

        Ok(Some(ActiveSubscription {
            id: subscription.id,
            current_period_end,
        }))
    }
}
