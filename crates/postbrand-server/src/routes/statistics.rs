//! Read-only derived views over posts, templates, and the UCB
//! performance log.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use postbrand_core::store::{performance_log, posts, templates};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/statistics/overview` — post counts by pipeline status.
pub async fn overview(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let counts = posts::count_by_status(&state.db).await?;
    let by_status: HashMap<String, i64> = counts.into_iter().collect();
    Ok(Json(json!({ "byStatus": by_status })))
}

/// `GET /api/statistics/templates` — per-template usage and engagement.
pub async fn templates_summary(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let items = templates::list(&state.db).await?;
    Ok(Json(json!(items)))
}

/// `GET /api/statistics/templates/:id/history` — the UCB selection log
/// for one template, most recent first.
pub async fn template_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entries = performance_log::list_for_template(&state.db, &id).await?;
    Ok(Json(json!(entries)))
}
