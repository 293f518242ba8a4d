//! Threads OAuth callback: exchanges an authorization code for a
//! long-lived token and persists the account and its encrypted auth row.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use postbrand_core::store::{threads_accounts, threads_auth};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OauthCallbackQuery {
    pub code: String,
}

/// `GET /api/threads/oauth/callback?code=` — public redirect target; the
/// authorization code itself is the proof of the user's consent.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OauthCallbackQuery>,
) -> Result<Json<Value>, ApiError> {
    let short_lived = state
        .social
        .exchange_code(&params.code)
        .await
        .map_err(postbrand_core::error::WorkflowError::from)?;

    let (long_lived_token, expires_at) = state
        .social
        .exchange_for_long_lived(&short_lived.access_token)
        .await
        .map_err(postbrand_core::error::WorkflowError::from)?;

    let external_account_id = short_lived.user_id.clone().unwrap_or_else(|| short_lived.access_token.clone());
    let account_id = Uuid::new_v4().to_string();

    threads_accounts::create(&state.db, &account_id, "admin", &external_account_id, &external_account_id, true)
        .await?;

    let encrypted = state.cipher.encrypt(&long_lived_token).map_err(postbrand_core::error::WorkflowError::from)?;
    threads_auth::upsert(&state.db, &account_id, &encrypted, &expires_at.to_rfc3339()).await?;

    Ok(Json(json!({ "accountId": account_id, "externalAccountId": external_account_id })))
}
