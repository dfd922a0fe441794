//! Subscription check and admin override endpoints.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use subscription::{OverrideConfirmation, OverrideRequest, SubscriptionCheck};
use tracing::info;

use crate::auth::bearer_token;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// `POST /check-subscription`
pub async fn check_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionCheck>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("No authorization header provided".to_string()))?;

    let identity = state.auth.verify(token).await?;
    if identity.email.is_none() {
        return Err(ApiError::Unauthorized(
            "User not authenticated or email not available".to_string(),
        ));
    }
    info!("Checking subscription for {}", identity.user_id);

    let check = state.subscriptions.check(&identity).await?;
    Ok(Json(check))
}

/// `POST /set-manual-upgrade`
pub async fn set_manual_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OverrideConfirmation>> {
    authorize_admin(&state, &headers)?;

    let request: OverrideRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;

    let confirmation = state.subscriptions.set_override(&request).await?;
    Ok(Json(confirmation))
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    match bearer_token(headers) {
        Some(token) if token == &*state.admin_token => Ok(()),
        _ => Err(ApiError::Unauthorized("Unauthorized".to_string())),
    }
}
