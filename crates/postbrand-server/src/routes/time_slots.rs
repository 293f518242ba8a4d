//! Posting time-slot CRUD. Admin only.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::Json;
use postbrand_core::store::time_slots::{self, TimeSlotInput};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::middleware::require_role;
use crate::auth::token::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/time-slots` — list all configured time slots.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let items = time_slots::list(&state.db).await?;
    Ok(Json(json!(items)))
}

/// `GET /api/time-slots/:id` — fetch one time slot.
pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let item = time_slots::get(&state.db, &id).await?;
    Ok(Json(json!(item)))
}

/// `POST /api/time-slots` — create a time slot.
pub async fn create(State(state): State<Arc<AppState>>, request: Request) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    let input: TimeSlotInput = parse_body(request).await?;

    let id = Uuid::new_v4().to_string();
    time_slots::create(&state.db, &id, &input).await?;
    let created = time_slots::get(&state.db, &id).await?;
    Ok(Json(json!(created)))
}

/// `PATCH /api/time-slots/:id` — update a time slot.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    let input: TimeSlotInput = parse_body(request).await?;

    time_slots::update(&state.db, &id, &input).await?;
    let updated = time_slots::get(&state.db, &id).await?;
    Ok(Json(json!(updated)))
}

/// `DELETE /api/time-slots/:id` — remove a time slot.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    time_slots::delete(&state.db, &id).await?;
    Ok(Json(json!({ "deleted": id })))
}

async fn parse_body<T: serde::de::DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}
