//! One-shot token-gated review actions, reached from the links embedded
//! in a chat review card rather than the bearer-authenticated admin API.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use postbrand_core::chat::InboundEvent;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReviewQuery {
    pub token: String,
}

/// `GET /api/review/approve?token=`
pub async fn approve(state: State<Arc<AppState>>, query: Query<ReviewQuery>) -> Result<Json<Value>, ApiError> {
    handle(state, query, "approve").await
}

/// `GET /api/review/regenerate?token=`
pub async fn regenerate(state: State<Arc<AppState>>, query: Query<ReviewQuery>) -> Result<Json<Value>, ApiError> {
    handle(state, query, "regenerate").await
}

/// `GET /api/review/skip?token=`
pub async fn skip(state: State<Arc<AppState>>, query: Query<ReviewQuery>) -> Result<Json<Value>, ApiError> {
    handle(state, query, "skip").await
}

async fn handle(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReviewQuery>,
    action: &str,
) -> Result<Json<Value>, ApiError> {
    let Some(review) = &state.review else {
        return Err(ApiError::BadRequest("chat review is not configured".to_string()));
    };
    let Some(admin_user_id) = &state.admin_user_id else {
        return Err(ApiError::BadRequest("no reviewer configured".to_string()));
    };

    let outcome = review
        .handle_event(InboundEvent::Postback {
            user_id: admin_user_id.clone(),
            action: action.to_string(),
            token: params.token,
        })
        .await?;

    Ok(Json(json!({ "outcome": format!("{outcome:?}") })))
}
