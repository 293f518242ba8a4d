//! Inbound chat webhook: signature-verified postback/text events that
//! drive the review coordinator.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use postbrand_core::chat::ChatNotifier;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/webhook/chat` — verified via `X-Line-Signature`, not bearer
/// auth, since the chat platform is the caller here, not an admin client.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    raw_body: String,
) -> Result<Json<Value>, ApiError> {
    let Some(review) = &state.review else {
        return Err(ApiError::BadRequest("chat review is not configured".to_string()));
    };
    let Some(signing_secret) = &state.config.chat.signing_secret else {
        return Err(ApiError::BadRequest("chat signing_secret is not configured".to_string()));
    };

    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-Line-Signature header".to_string()))?;

    if !ChatNotifier::verify_webhook_signature(raw_body.as_bytes(), signature, signing_secret) {
        return Err(ApiError::Unauthorized("webhook signature verification failed".to_string()));
    }

    let events = ChatNotifier::parse_webhook(&raw_body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook body: {e}")))?;

    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        let outcome = review.handle_event(event).await?;
        outcomes.push(format!("{outcome:?}"));
    }

    Ok(Json(json!({ "handled": outcomes })))
}
