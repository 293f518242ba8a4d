//! Shared application state for the postbrand server.

use std::path::PathBuf;
use std::sync::Arc;

use postbrand_core::chat::ChatNotifier;
use postbrand_core::config::Config;
use postbrand_core::review::ReviewCoordinator;
use postbrand_core::scheduler::Scheduler;
use postbrand_core::social::crypto::TokenCipher;
use postbrand_core::social::SocialClient;
use postbrand_core::store::DbPool;
use tokio::sync::broadcast;

use crate::ws::WsEvent;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// Fully loaded configuration (kept around for settings reads).
    pub config: Config,
    /// Path to the configuration file, if loaded from one.
    pub config_path: Option<PathBuf>,
    /// Broadcast channel sender for real-time post-lifecycle events.
    pub event_tx: broadcast::Sender<WsEvent>,
    /// Secret used to sign and verify bearer tokens.
    pub jwt_signing_secret: String,
    /// The single reviewer's chat user id, used to build `InboundEvent`s.
    pub admin_user_id: Option<String>,
    /// Chat client, present only when `chat.access_token` is configured.
    pub chat: Option<ChatNotifier>,
    /// Review workflow coordinator, present only when chat is configured.
    pub review: Option<Arc<ReviewCoordinator>>,
    /// Threads API client for the OAuth callback and manual token actions.
    pub social: SocialClient,
    /// Encrypts/decrypts stored OAuth tokens.
    pub cipher: TokenCipher,
    /// Background tick orchestrator, shared with the in-process workers.
    pub scheduler: Arc<Scheduler>,
}
