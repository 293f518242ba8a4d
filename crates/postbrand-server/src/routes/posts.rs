//! Post lifecycle endpoints: create, read, list, approve, skip, and the
//! manual-content fast path that bypasses generation and human review.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use postbrand_core::chat::InboundEvent;
use postbrand_core::queue::payloads::{GenerateJobPayload, PublishJobPayload};
use postbrand_core::queue::{self, EnqueueOptions};
use postbrand_core::store::{posts, review_requests};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// `GET /api/posts?status=` — paginated post listing.
pub async fn list(State(state): State<Arc<AppState>>, Query(q): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    let items = posts::list(&state.db, q.status.as_deref(), q.limit, q.offset).await?;
    Ok(Json(json!(items)))
}

/// `GET /api/posts/:id` — fetch one post.
pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let post = posts::get(&state.db, &id).await?;
    Ok(Json(json!(post)))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub style_preset: String,
    pub template_id: Option<String>,
    pub threads_account_id: Option<String>,
    pub scheduled_for: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub context: Option<String>,
}

/// `POST /api/posts` — create a DRAFT post and enqueue generation.
pub async fn create(State(state): State<Arc<AppState>>, Json(body): Json<CreatePostRequest>) -> Result<Json<Value>, ApiError> {
    let post_id = Uuid::new_v4().to_string();

    posts::create(
        &state.db,
        posts::NewPost {
            id: &post_id,
            created_by: "admin",
            template_id: body.template_id.as_deref(),
            threads_account_id: body.threads_account_id.as_deref(),
            is_ai_generated: true,
            tags: &body.tags,
            context: body.context.as_deref(),
            scheduled_for: body.scheduled_for.as_deref(),
        },
    )
    .await?;

    queue::enqueue(
        &state.db,
        &Uuid::new_v4().to_string(),
        "generate",
        &GenerateJobPayload {
            post_id: post_id.clone(),
            style_preset: body.style_preset,
            from_status: "DRAFT".to_string(),
            scheduled_time: body.scheduled_for,
        },
        EnqueueOptions::default(),
    )
    .await
    .map_err(postbrand_core::error::WorkflowError::from)?;

    let created = posts::get(&state.db, &post_id).await?;
    Ok(Json(json!(created)))
}

#[derive(Deserialize)]
pub struct ManualPostRequest {
    pub content: String,
    pub threads_account_id: String,
    pub scheduled_for: Option<String>,
}

/// `POST /api/posts/manual` — accept hand-written content, skipping
/// generation and human review entirely: DRAFT straight to APPROVED.
pub async fn create_manual(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ManualPostRequest>,
) -> Result<Json<Value>, ApiError> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".to_string()));
    }
    if content.chars().count() > state.config.pipeline.content_max_len {
        return Err(ApiError::BadRequest(format!(
            "content length {} exceeds limit of {}",
            content.chars().count(),
            state.config.pipeline.content_max_len
        )));
    }

    let post_id = Uuid::new_v4().to_string();
    posts::create(
        &state.db,
        posts::NewPost {
            id: &post_id,
            created_by: "admin",
            template_id: None,
            threads_account_id: Some(&body.threads_account_id),
            is_ai_generated: false,
            tags: &[],
            context: None,
            scheduled_for: body.scheduled_for.as_deref(),
        },
    )
    .await?;

    let revision_id = Uuid::new_v4().to_string();
    postbrand_core::store::revisions::append(&state.db, &revision_id, &post_id, content, "MANUAL", None).await?;
    posts::transition(&state.db, &post_id, "DRAFT", "APPROVED").await?;

    let delay_ms = match &body.scheduled_for {
        Some(scheduled_for) => match chrono::DateTime::parse_from_rfc3339(scheduled_for) {
            Ok(at) => (at.with_timezone(&Utc) - Utc::now()).num_milliseconds().max(0),
            Err(_) => return Err(ApiError::BadRequest("scheduled_for must be RFC3339".to_string())),
        },
        None => 0,
    };

    queue::enqueue(
        &state.db,
        &Uuid::new_v4().to_string(),
        "publish",
        &PublishJobPayload { post_id: post_id.clone() },
        EnqueueOptions { delay_ms, max_attempts: None },
    )
    .await
    .map_err(postbrand_core::error::WorkflowError::from)?;

    let created = posts::get(&state.db, &post_id).await?;
    Ok(Json(json!(created)))
}

/// `POST /api/posts/:id/approve` — approve a PENDING_REVIEW post through
/// the same review coordinator the chat webhook uses, so the outcome
/// (publish-now vs. leave for dispatch) stays in one place.
pub async fn approve(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    resolve_review_action(&state, &id, "approve").await
}

/// `POST /api/posts/:id/skip` — skip a PENDING_REVIEW post.
pub async fn skip(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    resolve_review_action(&state, &id, "skip").await
}

async fn resolve_review_action(state: &Arc<AppState>, post_id: &str, action: &str) -> Result<Json<Value>, ApiError> {
    let Some(review) = &state.review else {
        return Err(ApiError::BadRequest("chat review is not configured".to_string()));
    };
    let Some(admin_user_id) = &state.admin_user_id else {
        return Err(ApiError::BadRequest("no reviewer configured".to_string()));
    };
    let request = review_requests::active_for_post(&state.db, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no pending review request for post {post_id}")))?;

    let outcome = review
        .handle_event(InboundEvent::Postback {
            user_id: admin_user_id.clone(),
            action: action.to_string(),
            token: request.token,
        })
        .await?;

    Ok(Json(json!({ "outcome": format!("{outcome:?}") })))
}
