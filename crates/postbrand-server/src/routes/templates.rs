//! Content template CRUD. Admin only.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::Json;
use postbrand_core::store::templates::{self, TemplateInput};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::middleware::require_role;
use crate::auth::token::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/templates` — list all templates.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let items = templates::list(&state.db).await?;
    Ok(Json(json!(items)))
}

/// `GET /api/templates/:id` — fetch one template.
pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let item = templates::get(&state.db, &id).await?;
    Ok(Json(json!(item)))
}

/// `POST /api/templates` — create a template.
pub async fn create(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    let input: TemplateInput = parse_body(request).await?;

    let id = Uuid::new_v4().to_string();
    templates::create(&state.db, &id, &input).await?;
    let created = templates::get(&state.db, &id).await?;
    Ok(Json(json!(created)))
}

/// `PATCH /api/templates/:id` — update a template.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    let input: TemplateInput = parse_body(request).await?;

    templates::update(&state.db, &id, &input).await?;
    let updated = templates::get(&state.db, &id).await?;
    Ok(Json(json!(updated)))
}

/// `DELETE /api/templates/:id` — remove a template.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    require_role(&request, &[Role::Admin])?;
    templates::delete(&state.db, &id).await?;
    Ok(Json(json!({ "deleted": id })))
}

async fn parse_body<T: serde::de::DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}
