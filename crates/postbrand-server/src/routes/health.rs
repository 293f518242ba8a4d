//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

/// `GET /api/health` — liveness probe; no auth, no database access.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": postbrand_core::version(),
    }))
}
