//! Bearer-token authentication middleware.
//!
//! Verifies `Authorization: Bearer <token>` against the configured JWT
//! signing secret and inserts the decoded [`Claims`] into the request's
//! extensions, where route handlers read it to enforce role checks.
//! `/api/health`, `/api/ws`, `/api/threads/oauth/callback`,
//! `/api/webhook/chat`, and `/api/review/*` are exempt — the latter two
//! authenticate via a signature or a one-shot token instead.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::token::{self, Claims};
use crate::state::AppState;

const AUTH_EXEMPT_PREFIXES: &[&str] = &[
    "/api/health",
    "/api/ws",
    "/api/threads/oauth/callback",
    "/api/webhook/chat",
    "/api/review/",
];

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if AUTH_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return next.run(request).await;
    }

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(bearer) = bearer else {
        return unauthorized("missing bearer token");
    };

    match token::verify(bearer, &state.jwt_signing_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => unauthorized(&e.to_string()),
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": message }))).into_response()
}

/// Extract the caller's [`Claims`] from request extensions and confirm one
/// of `allowed` roles, for handlers with endpoint-specific permissions
/// beyond "any authenticated caller".
pub fn require_role(request: &Request, allowed: &[token::Role]) -> Result<Claims, crate::error::ApiError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| crate::error::ApiError::Unauthorized("missing bearer claims".to_string()))?;

    if claims.has_role(allowed) {
        Ok(claims)
    } else {
        Err(crate::error::ApiError::Forbidden(format!(
            "role '{}' is not permitted to perform this action",
            claims.role.as_str()
        )))
    }
}
