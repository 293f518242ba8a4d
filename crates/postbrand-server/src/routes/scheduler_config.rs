//! Singleton UCB scheduler configuration. Admin only for writes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::Json;
use postbrand_core::store::scheduler_config::{self, SchedulerConfigInput};
use serde_json::{json, Value};

use crate::auth::middleware::require_role;
use crate::auth::token::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/scheduler-config` — fetch the singleton row.
pub async fn get(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let config = scheduler_config::get(&state.db).await?;
    Ok(Json(json!(config)))
}

/// `PUT /api/scheduler-config` — replace the singleton row.
pub async fn update(State(state): State<Arc<AppState>>, request: Request) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
    let input: SchedulerConfigInput =
        serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;

    scheduler_config::update(&state.db, &input).await?;
    let updated = scheduler_config::get(&state.db).await?;
    Ok(Json(json!(updated)))
}
