//! Implementation of the `postbrand run` command.
//!
//! Starts the daemon in-process: the generate/publish/token-refresh
//! worker pools, the scheduler's periodic ticks, and the admin HTTP
//! server, all sharing one database pool and running until a shutdown
//! signal arrives.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use postbrand_core::chat::ChatNotifier;
use postbrand_core::config::{expand_tilde, Config};
use postbrand_core::error::{ValidationError, WorkflowError};
use postbrand_core::insights::InsightsSync;
use postbrand_core::pipeline::{ContentPipeline, GenerateOutcome, GenerateRequest};
use postbrand_core::publisher::Publisher;
use postbrand_core::queue::payloads::{GenerateJobPayload, PublishJobPayload, TokenRefreshJobPayload};
use postbrand_core::queue::{self, Job};
use postbrand_core::review::ReviewCoordinator;
use postbrand_core::runtime::Runtime;
use postbrand_core::scheduler::Scheduler;
use postbrand_core::social::crypto::TokenCipher;
use postbrand_core::social::SocialClient;
use postbrand_core::store::{self, DbPool};
use postbrand_core::token_lifecycle::TokenLifecycle;
use postbrand_core::ucb::UcbSelector;
use tokio::sync::Semaphore;

use postbrand_server::state::AppState;
use postbrand_server::ws::WsEvent;

/// Execute the `postbrand run` command.
///
/// Startup sequence:
/// 1. Load and validate configuration
/// 2. Initialize database
/// 3. Build the social client, token cipher, and chat notifier
/// 4. Build the content pipeline, publisher, token lifecycle, insights
///    sync, and UCB selector
/// 5. Build the scheduler and spawn its periodic ticks
/// 6. Spawn the generate/publish/token-refresh worker pools
/// 7. Build and spawn the admin HTTP server
/// 8. Run until a shutdown signal is received
pub async fn execute(config_path: &str) -> Result<()> {
    let config = Config::load_and_validate(Some(config_path))
        .map_err(|errors| anyhow::anyhow!("invalid configuration: {errors:?}"))?;

    let db_path = expand_tilde(&config.store.dsn);
    let pool = store::init_db(&db_path.to_string_lossy()).await?;
    tracing::info!(path = %db_path.display(), "database ready");

    let cipher = config
        .secrets
        .encryption_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("secrets.encryption_key is required"))
        .and_then(|key| TokenCipher::from_base64_key(key).map_err(|e| anyhow::anyhow!(e)))?;

    let has_chat = config.chat.access_token.is_some();
    let new_chat = || -> Result<Option<ChatNotifier>> {
        has_chat.then(|| ChatNotifier::new(&config.chat)).transpose().map_err(Into::into)
    };

    let review = if has_chat {
        let coordinator =
            ReviewCoordinator::new(pool.clone(), ChatNotifier::new(&config.chat)?, &config.pipeline, &config.chat)?;
        Some(Arc::new(coordinator))
    } else {
        None
    };

    let pipeline = Arc::new(ContentPipeline::new(pool.clone(), config.pipeline.clone(), &config.llm)?);

    let mut publisher = Publisher::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone(), &config.pipeline);
    let mut token_lifecycle = TokenLifecycle::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone());
    if let Some(chat) = new_chat()? {
        publisher = publisher.with_chat(chat, &config.chat);
    }
    if let Some(chat) = new_chat()? {
        token_lifecycle = token_lifecycle.with_chat(chat, &config.chat);
    }
    let insights_sync = InsightsSync::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone());
    let timezone = chrono_tz::Tz::from_str(&config.runtime.timezone).map_err(|_| anyhow::anyhow!("invalid runtime.timezone"))?;
    let ucb_selector = UcbSelector::new(pool.clone(), timezone);

    let mut worker_token_lifecycle =
        TokenLifecycle::new(pool.clone(), SocialClient::new(&config.social)?, cipher.clone());
    if let Some(chat) = new_chat()? {
        worker_token_lifecycle = worker_token_lifecycle.with_chat(chat, &config.chat);
    }

    let mut scheduler = Scheduler::new(pool.clone(), publisher, token_lifecycle, insights_sync, ucb_selector, &config.runtime)?;
    if let Some(chat) = new_chat()? {
        scheduler = scheduler.with_chat(chat, &config.chat);
    }
    let scheduler = Arc::new(scheduler);

    let mut runtime = Runtime::new(Duration::from_secs(config.runtime.shutdown_grace_secs));

    scheduler.clone().spawn_all(&mut runtime);

    spawn_generate_worker(&mut runtime, pool.clone(), &config, pipeline, review.clone());
    spawn_publish_worker(&mut runtime, pool.clone(), &config, scheduler.clone());
    spawn_token_refresh_worker(&mut runtime, pool.clone(), &config, Arc::new(worker_token_lifecycle));

    let chat = new_chat()?;

    let (event_tx, _) = tokio::sync::broadcast::channel::<WsEvent>(256);
    let jwt_signing_secret = config.secrets.jwt_signing_secret.clone().context("secrets.jwt_signing_secret is required")?;
    let admin_user_id = config.chat.admin_user_id.clone();
    let bind_host = config.server.host.clone();
    let bind_port = config.server.port;

    let state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        config_path: Some(expand_tilde(config_path)),
        event_tx,
        jwt_signing_secret,
        admin_user_id,
        chat,
        review,
        social: SocialClient::new(&config.social)?,
        cipher,
        scheduler,
    });
    let router = postbrand_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind_host}:{bind_port}")).await?;
    tracing::info!(host = %bind_host, port = bind_port, "admin API listening");
    let cancel = runtime.cancel_token();
    runtime.spawn("http-server", async move {
        if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(cancel.cancelled_owned()).await {
            tracing::error!(error = %e, "HTTP server exited with an error");
        }
    });

    tracing::info!(tasks = runtime.task_count(), "daemon running, waiting for shutdown");
    runtime.run_until_shutdown().await;
    tracing::info!("shutdown complete");

    Ok(())
}

/// Spawn a worker pool that polls `queue_name` for reservable jobs and runs
/// `handler` on each, bounded by `concurrency` concurrent in-flight jobs.
/// Completion/failure bookkeeping against the durable queue happens here so
/// individual handlers only need to return a `WorkflowError` on failure.
fn spawn_worker_pool<F, Fut>(
    runtime: &mut Runtime,
    name: &'static str,
    pool: DbPool,
    queue_name: &'static str,
    lease_ms: i64,
    backoff_schedule_ms: Vec<u64>,
    concurrency: usize,
    handler: F,
) where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkflowError>> + Send + 'static,
{
    let cancel = runtime.cancel_token();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let handler = Arc::new(handler);

    runtime.spawn(name, async move {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            match queue::reserve(&pool, queue_name, lease_ms).await {
                Ok(Some(job)) => {
                    let pool = pool.clone();
                    let handler = handler.clone();
                    let backoff_schedule_ms = backoff_schedule_ms.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let job_id = job.id.clone();
                        match handler(job).await {
                            Ok(()) => {
                                if let Err(e) = queue::complete(&pool, &job_id).await {
                                    tracing::error!(queue = queue_name, job = %job_id, error = %e, "failed to mark job complete");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(queue = queue_name, job = %job_id, error = %e, "job failed");
                                if let Err(e2) = queue::fail(&pool, &job_id, &e.to_string(), &backoff_schedule_ms).await {
                                    tracing::error!(queue = queue_name, job = %job_id, error = %e2, "failed to mark job failed");
                                }
                            }
                        }
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(queue = queue_name, error = %e, "failed to reserve job");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });
}

fn spawn_generate_worker(
    runtime: &mut Runtime,
    pool: DbPool,
    config: &Config,
    pipeline: Arc<ContentPipeline>,
    review: Option<Arc<ReviewCoordinator>>,
) {
    let backoff = config.queue.backoff_schedule_ms.iter().map(|ms| *ms as u64).collect::<Vec<_>>();
    spawn_worker_pool(
        runtime,
        "generate-worker",
        pool,
        "generate",
        config.queue.lease_ms as i64,
        backoff,
        config.queue.generate_concurrency,
        move |job| {
            let pipeline = pipeline.clone();
            let review = review.clone();
            async move {
                let payload: GenerateJobPayload = job.payload_as()?;
                let from_status: &'static str = match payload.from_status.as_str() {
                    "DRAFT" => "DRAFT",
                    "PENDING_REVIEW" => "PENDING_REVIEW",
                    other => {
                        return Err(WorkflowError::from(ValidationError::InvalidEnum {
                            field: "from_status".to_string(),
                            value: other.to_string(),
                        }))
                    }
                };
                let request = GenerateRequest {
                    post_id: payload.post_id,
                    style_preset: payload.style_preset,
                    manual_content: None,
                    scheduled_time: payload.scheduled_time,
                    from_status,
                };
                let post_id = request.post_id.clone();

                match pipeline.generate(request).await? {
                    GenerateOutcome::PendingReview { revision_id, content, scheduled_time, .. } => {
                        if let Some(review) = &review {
                            review.issue(&post_id, &revision_id, &content, scheduled_time.as_deref()).await?;
                        }
                    }
                    GenerateOutcome::Failed { .. } => {}
                }
                Ok(())
            }
        },
    );
}

fn spawn_publish_worker(runtime: &mut Runtime, pool: DbPool, config: &Config, scheduler: Arc<Scheduler>) {
    let backoff = config.queue.backoff_schedule_ms.iter().map(|ms| *ms as u64).collect::<Vec<_>>();
    spawn_worker_pool(
        runtime,
        "publish-worker",
        pool,
        "publish",
        config.queue.lease_ms as i64,
        backoff,
        config.queue.publish_concurrency,
        move |job| {
            let scheduler = scheduler.clone();
            async move {
                let payload: PublishJobPayload = job.payload_as()?;
                scheduler.run_publish_job(&payload).await
            }
        },
    );
}

fn spawn_token_refresh_worker(runtime: &mut Runtime, pool: DbPool, config: &Config, token_lifecycle: Arc<TokenLifecycle>) {
    let backoff = config.queue.backoff_schedule_ms.iter().map(|ms| *ms as u64).collect::<Vec<_>>();
    spawn_worker_pool(
        runtime,
        "token-refresh-worker",
        pool,
        "tokenRefresh",
        config.queue.lease_ms as i64,
        backoff,
        config.queue.token_refresh_concurrency,
        move |job| {
            let token_lifecycle = token_lifecycle.clone();
            async move {
                let payload: TokenRefreshJobPayload = job.payload_as()?;
                token_lifecycle.refresh_account(&payload.account_id).await?;
                Ok(())
            }
        },
    );
}
