//! postbrand API server binary.
//!
//! Serves the admin REST API standalone. Background workers and the
//! scheduler's periodic ticks are started by `postbrand run`, which embeds
//! this crate's router in-process alongside them; this binary is useful on
//! its own for admin/API-only deployments against an already-running
//! daemon's database.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use postbrand_core::chat::ChatNotifier;
use postbrand_core::config::{expand_tilde, Config};
use postbrand_core::insights::InsightsSync;
use postbrand_core::publisher::Publisher;
use postbrand_core::review::ReviewCoordinator;
use postbrand_core::scheduler::Scheduler;
use postbrand_core::social::crypto::TokenCipher;
use postbrand_core::social::SocialClient;
use postbrand_core::store;
use postbrand_core::token_lifecycle::TokenLifecycle;
use postbrand_core::ucb::UcbSelector;
use tracing_subscriber::EnvFilter;

use postbrand_server::state::AppState;
use postbrand_server::ws::WsEvent;

/// postbrand API server — serves the admin REST API.
#[derive(Parser)]
#[command(name = "postbrand-server", version, about)]
struct Cli {
    /// Port to listen on; overrides the config file's `server.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Host address to bind to; overrides the config file's `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Path to the postbrand configuration file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load_and_validate(cli.config.as_deref())
        .map_err(|errors| anyhow::anyhow!("invalid configuration: {errors:?}"))?;

    let db_path = expand_tilde(&config.store.dsn);
    let pool = store::init_db(&db_path.to_string_lossy()).await?;

    let bind_host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let bind_port = cli.port.unwrap_or(config.server.port);

    let social = SocialClient::new(&config.social)?;
    let cipher = config
        .secrets
        .encryption_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("secrets.encryption_key is required"))
        .and_then(|key| TokenCipher::from_base64_key(key).map_err(|e| anyhow::anyhow!(e)))?;

    let chat = config.chat.access_token.as_ref().map(|_| ChatNotifier::new(&config.chat)).transpose()?;
    let admin_user_id = config.chat.admin_user_id.clone();

    let review = match config.chat.access_token.is_some() {
        true => {
            let coordinator =
                ReviewCoordinator::new(pool.clone(), ChatNotifier::new(&config.chat)?, &config.pipeline, &config.chat)?;
            Some(Arc::new(coordinator))
        }
        false => None,
    };

    let publisher = Publisher::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone(), &config.pipeline);
    let token_lifecycle = TokenLifecycle::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone());
    let insights_sync = InsightsSync::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone());
    let timezone = chrono_tz::Tz::from_str(&config.runtime.timezone).map_err(|_| anyhow::anyhow!("invalid runtime.timezone"))?;
    let ucb_selector = UcbSelector::new(pool.clone(), timezone);
    let scheduler = Arc::new(Scheduler::new(pool.clone(), publisher, token_lifecycle, insights_sync, ucb_selector, &config.runtime)?);

    let (event_tx, _) = tokio::sync::broadcast::channel::<WsEvent>(256);

    let jwt_signing_secret = config
        .secrets
        .jwt_signing_secret
        .clone()
        .context("secrets.jwt_signing_secret is required")?;

    let state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        config_path: cli.config.map(std::path::PathBuf::from),
        event_tx,
        jwt_signing_secret,
        admin_user_id,
        chat,
        review,
        social,
        cipher,
        scheduler,
    });

    let router = postbrand_server::build_router(state);

    if bind_host == "0.0.0.0" {
        tracing::warn!("binding to 0.0.0.0 — server accessible from the local network");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind_host}:{bind_port}")).await?;
    tracing::info!(host = %bind_host, port = bind_port, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
