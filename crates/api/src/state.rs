//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use ollama_relay::Relay;
use subscription::{StripeBilling, SubscriptionService};
use web_search::WebSearch;

use crate::auth::AuthClient;

/// Subscription service backed by Stripe and SQLite.
pub type Subscriptions = SubscriptionService<StripeBilling, Database>;

/// Shared application state. Every field is an immutable handle.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub subscriptions: Arc<Subscriptions>,
    pub search: WebSearch,
    pub auth: AuthClient,
    pub admin_token: Arc<str>,
    pub enforce_model_access: bool,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        relay: Relay,
        subscriptions: Subscriptions,
        search: WebSearch,
        auth: AuthClient,
        admin_token: impl Into<Arc<str>>,
        enforce_model_access: bool,
    ) -> Self {
        Self {
            relay,
            subscriptions: Arc::new(subscriptions),
            search,
            auth,
            admin_token: admin_token.into(),
            enforce_model_access,
        }
    }
}
