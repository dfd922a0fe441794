//! The generation proxy endpoint.
//!
//! One route serves several actions, selected by the `action` field:
//! model listing, web search, page fetch, and (by default) streamed
//! generation.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ollama_relay::{ChatMessage, GenerationRequest, DEFAULT_FREE_MODEL, VISION_MODEL};
use serde::Deserialize;
use subscription::Plan;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::auth::bearer_token;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Body of a proxy request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ProxyRequest {
    fn prompt(&self) -> Result<&str> {
        self.prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("prompt is required".to_string()))
    }
}

/// `POST /ollama-proxy`
pub async fn ollama_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request = parse_body(&body)?;
    debug!(
        "Proxy request: action={:?}, model={:?}",
        request.action, request.model
    );

    match request.action.as_deref() {
        Some("get_models") => Ok(get_models(&state, &request).await),
        Some("search") => search(&state, &request).await,
        Some("web") => fetch_page(&state, &request).await,
        _ => generate(&state, &headers, request).await,
    }
}

fn parse_body(body: &[u8]) -> Result<ProxyRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("Invalid JSON in request body".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("JSON parse error: {}", e);
        ApiError::BadRequest("Invalid JSON in request body".to_string())
    })
}

async fn get_models(state: &AppState, request: &ProxyRequest) -> Response {
    match state.relay.list_models(request.base_url.as_deref()).await {
        Ok(models) => {
            info!("Models fetched: {}", models.len());
            Json(serde_json::json!({ "models": models })).into_response()
        }
        Err(e) => {
            warn!("Models fetch error: {}", e);
            Json(serde_json::json!({
                "models": [],
                "error": "Failed to fetch models"
            }))
            .into_response()
        }
    }
}

async fn search(state: &AppState, request: &ProxyRequest) -> Result<Response> {
    let results = state.search.search(request.prompt()?).await;
    Ok(Json(serde_json::json!({ "results": results })).into_response())
}

async fn fetch_page(state: &AppState, request: &ProxyRequest) -> Result<Response> {
    let url = request.url.as_deref().unwrap_or_default();
    let page = state.search.fetch_page(url).await?;
    Ok(Json(page).into_response())
}

async fn generate(state: &AppState, headers: &HeaderMap, request: ProxyRequest) -> Result<Response> {
    // Image data only selects vision for explicit generate calls.
    let image = match request.action.as_deref() {
        Some("generate") => request.image,
        _ => None,
    };

    let generation = GenerationRequest {
        prompt: request.prompt,
        model: request.model,
        image,
        history: request.history,
        base_url: request.base_url,
    };

    if state.enforce_model_access {
        let model = generation.selected_model(&state.relay.config().default_model);
        check_model_access(state, headers, model).await?;
    }

    let events = state.relay.open(generation).await?;
    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_line())));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

async fn check_model_access(state: &AppState, headers: &HeaderMap, model: &str) -> Result<()> {
    // The fixed vision model is open to every tier.
    if model == DEFAULT_FREE_MODEL
        || model == state.relay.config().default_model
        || model == VISION_MODEL
    {
        return Ok(());
    }

    if caller_plan(state, headers).await == Plan::Pro {
        return Ok(());
    }

    Err(ApiError::Forbidden(format!(
        "This model is only available to Pro users. Upgrade your subscription or use {}.",
        DEFAULT_FREE_MODEL
    )))
}

/// Plan of the caller; anything short of a verified token means free.
async fn caller_plan(state: &AppState, headers: &HeaderMap) -> Plan {
    let Some(token) = bearer_token(headers) else {
        return Plan::Free;
    };

    let identity = match state.auth.verify(token).await {
        Ok(identity) => identity,
        Err(e) => {
            debug!("Treating caller as free tier: {}", e);
            return Plan::Free;
        }
    };

    match state.subscriptions.plan_for(&identity.user_id).await {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Error checking subscription for {}: {}", identity.user_id, e);
            Plan::Free
        }
    }
}
