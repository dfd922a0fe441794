//! HTTP API for the assistant backend.
//!
//! Serves the streaming generation proxy, subscription checks against
//! Stripe, and the admin override endpoint.

mod auth;
mod config;
mod error;
mod routes;
mod state;

use database::Database;
use ollama_relay::Relay;
use subscription::{StripeBilling, SubscriptionService};
use tracing::info;
use tracing_subscriber::EnvFilter;
use web_search::WebSearch;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting API server");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let relay = Relay::new(config.relay.clone())?;
    let subscriptions = SubscriptionService::new(StripeBilling::new(config.stripe.clone())?, db);
    let search = WebSearch::new(config.search.clone())?;
    let auth = AuthClient::new(config.auth.clone())?;

    let state = AppState::new(
        relay,
        subscriptions,
        search,
        auth,
        config.admin_token.as_str(),
        config.enforce_model_access,
    );

    let app = routes::app(state);

    info!(addr = %config.addr, "API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
