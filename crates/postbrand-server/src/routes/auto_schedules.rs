//! Daily auto-schedule history and the manual trigger.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono_tz::Tz;
use postbrand_core::store::daily_auto_schedules;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::ApiError;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 30;

/// `GET /api/auto-schedules` — the last 30 daily schedules.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let items = daily_auto_schedules::list_recent(&state.db, RECENT_LIMIT).await?;
    Ok(Json(json!(items)))
}

/// `POST /api/trigger-daily-schedule` — idempotent for the current day:
/// materializes today's auto-schedule if one doesn't already exist.
pub async fn trigger(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let created = state.scheduler.ensure_schedule_tick().await?;

    let timezone = Tz::from_str(&state.config.runtime.timezone).unwrap_or(chrono_tz::UTC);
    let today = chrono::Utc::now().with_timezone(&timezone).format("%Y-%m-%d").to_string();
    let active = daily_auto_schedules::active_for_date(&state.db, &today).await?;

    Ok(Json(json!({ "created": created, "schedule": active })))
}
