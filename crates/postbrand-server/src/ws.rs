//! WebSocket hub for real-time event streaming.
//!
//! Provides a `/api/ws` endpoint that streams post-lifecycle events to
//! connected admin clients via a `tokio::sync::broadcast` channel.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::token;
use crate::state::AppState;

/// Events pushed to WebSocket clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    /// A post transitioned from one pipeline status to another.
    PostStatusChanged {
        post_id: String,
        from_status: String,
        to_status: String,
        timestamp: String,
    },
    /// A review request was issued to the reviewer.
    ReviewIssued { post_id: String, revision_id: String },
    /// The daily auto-schedule was materialized for a date.
    ScheduleMaterialized {
        schedule_date: String,
        schedule_id: String,
        post_id: Option<String>,
    },
    /// A publish attempt failed.
    PublishFailed { post_id: String, reason: String },
    /// An error occurred streaming events.
    Error { message: String },
}

/// Query parameters for WebSocket authentication.
#[derive(Deserialize)]
pub struct WsQuery {
    /// Bearer token passed as a query parameter, since browsers can't set
    /// headers on the WebSocket upgrade request.
    pub token: String,
}

/// `GET /api/ws?token=...` — WebSocket upgrade with bearer-token auth.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
) -> Response {
    if token::verify(&params.token, &state.jwt_signing_secret).is_err() {
        return (StatusCode::UNAUTHORIZED, axum::Json(json!({"error": "unauthorized"}))).into_response();
    }

    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a single WebSocket connection.
///
/// Subscribes to the broadcast channel and forwards events as JSON text frames.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.event_tx.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => {
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize WsEvent");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(count)) => {
                tracing::warn!(count, "websocket client lagged, events dropped");
                let error_event = WsEvent::Error { message: format!("{count} events dropped due to slow consumer") };
                if let Ok(json) = serde_json::to_string(&error_event) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
