//! Admin HTTP API for the postbrand content pipeline.
//!
//! Exposes the post lifecycle, template/time-slot/scheduler configuration,
//! the chat webhook, the Threads OAuth callback, and a WebSocket event
//! stream, behind bearer-token auth with role claims.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router with all API routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health))
        // Posts
        .route("/posts", get(routes::posts::list).post(routes::posts::create))
        .route("/posts/manual", post(routes::posts::create_manual))
        .route("/posts/{id}", get(routes::posts::get))
        .route("/posts/{id}/approve", post(routes::posts::approve))
        .route("/posts/{id}/skip", post(routes::posts::skip))
        // Token-gated review links from chat review cards
        .route("/review/approve", get(routes::review::approve))
        .route("/review/regenerate", get(routes::review::regenerate))
        .route("/review/skip", get(routes::review::skip))
        // Chat webhook and Threads OAuth callback
        .route("/webhook/chat", post(routes::webhook::chat))
        .route("/threads/oauth/callback", get(routes::oauth::callback))
        // Templates
        .route("/templates", get(routes::templates::list).post(routes::templates::create))
        .route(
            "/templates/{id}",
            get(routes::templates::get).patch(routes::templates::update).delete(routes::templates::delete),
        )
        // Time slots
        .route("/time-slots", get(routes::time_slots::list).post(routes::time_slots::create))
        .route(
            "/time-slots/{id}",
            get(routes::time_slots::get).patch(routes::time_slots::update).delete(routes::time_slots::delete),
        )
        // Scheduler config (singleton row)
        .route(
            "/scheduler-config",
            get(routes::scheduler_config::get).put(routes::scheduler_config::update),
        )
        // Auto schedules
        .route("/auto-schedules", get(routes::auto_schedules::list))
        .route("/trigger-daily-schedule", post(routes::auto_schedules::trigger))
        // Statistics
        .route("/statistics/overview", get(routes::statistics::overview))
        .route("/statistics/templates", get(routes::statistics::templates_summary))
        .route("/statistics/templates/{id}/history", get(routes::statistics::template_history))
        // WebSocket
        .route("/ws", get(ws::ws_handler))
        // Auth middleware — applied to all routes; exempt paths are
        // carved out inside the middleware itself.
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
