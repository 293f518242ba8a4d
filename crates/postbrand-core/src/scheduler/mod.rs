//! Orchestrates the periodic ticks that drive postbrand end to end: the
//! review-expiry sweep, due-schedule dispatch, token refresh scanning,
//! insights syncing, the daily auto-schedule guarantee, and reviewer
//! reminders.
//!
//! Each tick is its own method on [`Scheduler`] so it can be tested in
//! isolation; [`Scheduler::spawn_all`] wires them onto [`Runtime`] using
//! the same [`LoopScheduler`]-driven loop for each.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use uuid::Uuid;

use crate::chat::ChatNotifier;
use crate::config::{ChatConfig, RuntimeConfig};
use crate::error::{ConfigError, WorkflowError};
use crate::insights::InsightsSync;
use crate::publisher::Publisher;
use crate::queue::payloads::PublishJobPayload;
use crate::queue::{self, EnqueueOptions};
use crate::runtime::{scheduler_from_config, Runtime};
use crate::store::{daily_auto_schedules, posts, review_requests, DbPool};
use crate::token_lifecycle::TokenLifecycle;
use crate::ucb::UcbSelector;

fn format_timestamp(ts: chrono::DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%.3fZ").to_string()
}

/// Periodic-tick orchestrator for the runtime's background work.
pub struct Scheduler {
    pool: DbPool,
    publisher: Publisher,
    token_lifecycle: TokenLifecycle,
    insights_sync: InsightsSync,
    ucb_selector: UcbSelector,
    chat: Option<ChatNotifier>,
    admin_user_id: Option<String>,
    timezone: Tz,
    review_sweep_interval_secs: u64,
    dispatch_interval_secs: u64,
    token_scan_interval_secs: u64,
    insights_interval_secs: u64,
    ensure_schedule_interval_secs: u64,
    reminder_interval_secs: u64,
}

impl Scheduler {
    /// Build a scheduler. Fails if `runtime_config.timezone` isn't a valid
    /// IANA timezone name.
    pub fn new(
        pool: DbPool,
        publisher: Publisher,
        token_lifecycle: TokenLifecycle,
        insights_sync: InsightsSync,
        ucb_selector: UcbSelector,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, ConfigError> {
        let timezone = Tz::from_str(&runtime_config.timezone).map_err(|_| ConfigError::InvalidValue {
            field: "runtime.timezone".to_string(),
            message: format!("'{}' is not a recognized IANA timezone", runtime_config.timezone),
        })?;

        Ok(Self {
            pool,
            publisher,
            token_lifecycle,
            insights_sync,
            ucb_selector,
            chat: None,
            admin_user_id: None,
            timezone,
            review_sweep_interval_secs: runtime_config.review_sweep_interval_secs,
            dispatch_interval_secs: runtime_config.dispatch_interval_secs,
            token_scan_interval_secs: runtime_config.token_scan_interval_secs,
            insights_interval_secs: runtime_config.insights_interval_secs,
            ensure_schedule_interval_secs: runtime_config.ensure_schedule_interval_secs,
            reminder_interval_secs: runtime_config.reminder_interval_secs,
        })
    }

    pub fn with_chat(mut self, chat: ChatNotifier, chat_config: &ChatConfig) -> Self {
        self.admin_user_id = chat_config.admin_user_id.clone();
        self.chat = Some(chat);
        self
    }

    /// Expire overdue review requests and fail the posts/schedules they
    /// were blocking on, then expire GENERATED schedules whose deadline is
    /// within 10 minutes and whose post never got reviewed — these would
    /// otherwise dispatch with unreviewed content, so the draft is purged
    /// and no publish job is ever enqueued for them. Returns the total
    /// number of schedules affected.
    pub async fn review_sweep_tick(&self) -> Result<usize, WorkflowError> {
        let now = format_timestamp(Utc::now());
        let overdue = review_requests::list_overdue(&self.pool, &now).await?;

        for request in &overdue {
            posts::mark_failed(
                &self.pool,
                &request.post_id,
                "FAILED",
                "REVIEW_EXPIRED",
                "review request expired without a decision",
            )
            .await?;
            if let Some(schedule) = daily_auto_schedules::for_post(&self.pool, &request.post_id).await? {
                daily_auto_schedules::mark_failed(&self.pool, &schedule.id, "review expired").await?;
            }
        }

        review_requests::expire_overdue(&self.pool, &now).await?;

        let deadline = format_timestamp(Utc::now() + chrono::Duration::minutes(10));
        let nearing_deadline =
            daily_auto_schedules::list_unreviewed_nearing_deadline(&self.pool, &deadline).await?;
        let mut expired_unreviewed = 0;
        for schedule in &nearing_deadline {
            if daily_auto_schedules::transition(&self.pool, &schedule.id, "GENERATED", "EXPIRED")
                .await
                .is_err()
            {
                continue;
            }
            if let Some(post_id) = &schedule.post_id {
                posts::delete(&self.pool, post_id).await?;
            }
            expired_unreviewed += 1;
        }

        Ok(overdue.len() + expired_unreviewed)
    }

    /// Claim every schedule due for dispatch and enqueue its publish job.
    /// Returns the number dispatched.
    pub async fn dispatch_tick(&self) -> Result<usize, WorkflowError> {
        let now = format_timestamp(Utc::now());
        let due = daily_auto_schedules::due_for_dispatch(&self.pool, &now).await?;

        let mut dispatched = 0;
        for schedule in due {
            let Some(post_id) = schedule.post_id.clone() else {
                continue;
            };
            if daily_auto_schedules::transition(&self.pool, &schedule.id, "APPROVED", "PUBLISHING")
                .await
                .is_err()
            {
                continue;
            }
            queue::enqueue(
                &self.pool,
                &Uuid::new_v4().to_string(),
                "publish",
                &PublishJobPayload { post_id },
                EnqueueOptions::default(),
            )
            .await?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Run a single dispatched publish job; this is what a `publish` queue
    /// worker calls after reserving the job.
    pub async fn run_publish_job(&self, payload: &PublishJobPayload) -> Result<(), WorkflowError> {
        self.publisher.publish(&payload.post_id).await?;
        Ok(())
    }

    /// Scan for soon-expiring tokens and enqueue refresh jobs.
    pub async fn token_scan_tick(&self) -> Result<usize, WorkflowError> {
        self.token_lifecycle.scan().await
    }

    /// Sync insights for posts due for a refresh.
    pub async fn insights_tick(&self) -> Result<usize, WorkflowError> {
        Ok(self.insights_sync.sync_due().await?.len())
    }

    /// Ensure today's (in the configured timezone) auto-schedule exists,
    /// running the UCB selector if it doesn't. Returns whether a new
    /// schedule was created.
    pub async fn ensure_schedule_tick(&self) -> Result<bool, WorkflowError> {
        let today = Utc::now().with_timezone(&self.timezone).format("%Y-%m-%d").to_string();
        if daily_auto_schedules::active_for_date(&self.pool, &today).await?.is_some() {
            return Ok(false);
        }
        self.ucb_selector.select_for_date(&today).await?;
        Ok(true)
    }

    /// Nudge every reviewer with an outstanding PENDING review request.
    /// Returns the number notified.
    pub async fn reminder_tick(&self) -> Result<usize, WorkflowError> {
        let reviewers = review_requests::reviewers_with_pending(&self.pool).await?;
        if let Some(chat) = &self.chat {
            for reviewer in &reviewers {
                let _ = chat.send_text(reviewer, "You have posts waiting for review.").await;
            }
        }
        Ok(reviewers.len())
    }

    /// Spawn one background task per tick onto `runtime`, each paced by its
    /// own configured interval with no jitter (a steady cadence is
    /// preferable to a randomized one for cron-like sweeps).
    pub fn spawn_all(self: Arc<Self>, runtime: &mut Runtime) {
        self.clone().spawn_tick(runtime, "review-sweep", self.review_sweep_interval_secs, |s| async move {
            if let Err(e) = s.review_sweep_tick().await {
                tracing::error!(error = %e, "review sweep tick failed");
            }
        });
        self.clone().spawn_tick(runtime, "dispatch", self.dispatch_interval_secs, |s| async move {
            if let Err(e) = s.dispatch_tick().await {
                tracing::error!(error = %e, "dispatch tick failed");
            }
        });
        self.clone().spawn_tick(runtime, "token-scan", self.token_scan_interval_secs, |s| async move {
            if let Err(e) = s.token_scan_tick().await {
                tracing::error!(error = %e, "token scan tick failed");
            }
        });
        self.clone().spawn_tick(runtime, "insights-sync", self.insights_interval_secs, |s| async move {
            if let Err(e) = s.insights_tick().await {
                tracing::error!(error = %e, "insights sync tick failed");
            }
        });
        self.clone().spawn_tick(runtime, "ensure-schedule", self.ensure_schedule_interval_secs, |s| async move {
            if let Err(e) = s.ensure_schedule_tick().await {
                tracing::error!(error = %e, "ensure schedule tick failed");
            }
        });
        self.spawn_tick(runtime, "review-reminder", self.reminder_interval_secs, |s| async move {
            if let Err(e) = s.reminder_tick().await {
                tracing::error!(error = %e, "review reminder tick failed");
            }
        });
    }

    fn spawn_tick<F, Fut>(self: Arc<Self>, runtime: &mut Runtime, name: &'static str, interval_secs: u64, run: F)
    where
        F: Fn(Arc<Self>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = runtime.cancel_token();
        let loop_scheduler = scheduler_from_config(interval_secs, 0, 0);
        runtime.spawn(name, async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = loop_scheduler.tick() => {
                        run(self.clone()).await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::crypto::TokenCipher;
    use crate::social::SocialClient;
    use crate::store::{init_test_db, posts, revisions, templates, time_slots};
    use wiremock::MockServer;

    fn cipher() -> TokenCipher {
        TokenCipher::new(&[9u8; 32]).unwrap()
    }

    fn social_client(server: &MockServer) -> SocialClient {
        let config = crate::config::SocialConfig {
            client_id: "cid".to_string(),
            client_secret: Some("secret".to_string()),
            redirect_uri: "https://app.example/cb".to_string(),
            timeout_secs: 5,
            base_url: String::new(),
        };
        SocialClient::with_base_url(&config, server.uri()).unwrap()
    }

    async fn scheduler(pool: &DbPool, server: &MockServer) -> Scheduler {
        let pipeline_config = crate::config::PipelineConfig::default();
        let publisher = Publisher::new(pool.clone(), social_client(server), cipher(), &pipeline_config);
        let token_lifecycle = TokenLifecycle::new(pool.clone(), social_client(server), cipher());
        let insights_sync = InsightsSync::new(pool.clone(), social_client(server), cipher());
        let ucb_selector = UcbSelector::new(pool.clone(), chrono_tz::Asia::Taipei);
        let runtime_config = RuntimeConfig::default();
        Scheduler::new(pool.clone(), publisher, token_lifecycle, insights_sync, ucb_selector, &runtime_config).unwrap()
    }

    #[tokio::test]
    async fn new_rejects_an_unrecognized_timezone() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        let pipeline_config = crate::config::PipelineConfig::default();
        let publisher = Publisher::new(pool.clone(), social_client(&server), cipher(), &pipeline_config);
        let token_lifecycle = TokenLifecycle::new(pool.clone(), social_client(&server), cipher());
        let insights_sync = InsightsSync::new(pool.clone(), social_client(&server), cipher());
        let ucb_selector = UcbSelector::new(pool.clone(), chrono_tz::Asia::Taipei);
        let mut runtime_config = RuntimeConfig::default();
        runtime_config.timezone = "Not/AZone".to_string();

        let err = Scheduler::new(pool, publisher, token_lifecycle, insights_sync, ucb_selector, &runtime_config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn review_sweep_fails_posts_with_expired_review_requests() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        posts::create(
            &pool,
            posts::NewPost {
                id: "p1",
                created_by: "admin",
                template_id: None,
                threads_account_id: None,
                is_ai_generated: false,
                tags: &[],
                context: None,
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
        posts::transition(&pool, "p1", "DRAFT", "GENERATING").await.unwrap();
        posts::transition(&pool, "p1", "GENERATING", "PENDING_REVIEW").await.unwrap();
        revisions::append(&pool, "r1", "p1", "hello", "PRIMARY", Some(0.1)).await.unwrap();
        review_requests::create(&pool, "rr1", "p1", "r1", "tok-1", "user-1", "2000-01-01T00:00:00Z")
            .await
            .unwrap();

        let scheduler = scheduler(&pool, &server).await;
        let count = scheduler.review_sweep_tick().await.unwrap();
        assert_eq!(count, 1);

        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "FAILED");
        assert_eq!(post.last_error_code.as_deref(), Some("REVIEW_EXPIRED"));

        let rr = review_requests::get_by_token(&pool, "tok-1").await.unwrap();
        assert_eq!(rr.status, "EXPIRED");
    }

    #[tokio::test]
    async fn review_sweep_expires_unreviewed_schedules_nearing_their_deadline() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        templates::create(
            &pool,
            "t1",
            &templates::TemplateInput {
                name: "Tip".to_string(),
                prompt: "p".to_string(),
                preferred_engine: "PRIMARY".to_string(),
                enabled: true,
            },
        )
        .await
        .unwrap();
        time_slots::create(
            &pool,
            "s1",
            &time_slots::TimeSlotInput {
                label: "Morning".to_string(),
                start_hour: 8,
                start_minute: 0,
                end_hour: 10,
                end_minute: 0,
                active_days: vec![1, 2, 3, 4, 5, 6, 7],
                enabled: true,
            },
        )
        .await
        .unwrap();

        let scheduled_time = format_timestamp(Utc::now() + chrono::Duration::minutes(8));
        daily_auto_schedules::create(
            &pool,
            daily_auto_schedules::NewDailyAutoSchedule {
                id: "d1",
                schedule_date: "2026-07-30",
                scheduled_time: &scheduled_time,
                selected_time_slot_id: "s1",
                selected_template_id: "t1",
                ucb_score: 1.0,
                selection_reason: "ucb1",
            },
        )
        .await
        .unwrap();
        posts::create(
            &pool,
            posts::NewPost {
                id: "p1",
                created_by: "ucb",
                template_id: Some("t1"),
                threads_account_id: None,
                is_ai_generated: true,
                tags: &[],
                context: None,
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
        posts::transition(&pool, "p1", "DRAFT", "GENERATING").await.unwrap();
        posts::transition(&pool, "p1", "GENERATING", "PENDING_REVIEW").await.unwrap();
        daily_auto_schedules::attach_post(&pool, "d1", "p1").await.unwrap();

        let scheduler = scheduler(&pool, &server).await;
        let count = scheduler.review_sweep_tick().await.unwrap();
        assert_eq!(count, 1);

        let schedule = daily_auto_schedules::get(&pool, "d1").await.unwrap();
        assert_eq!(schedule.status, "EXPIRED");

        assert!(posts::get(&pool, "p1").await.is_err(), "draft post must be purged");

        let job = queue::reserve(&pool, "publish", 60_000).await.unwrap();
        assert!(job.is_none(), "no publish job should ever be enqueued for an expired schedule");
    }

    #[tokio::test]
    async fn dispatch_tick_claims_due_schedules_and_enqueues_publish() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        templates::create(
            &pool,
            "t1",
            &templates::TemplateInput {
                name: "Tip".to_string(),
                prompt: "p".to_string(),
                preferred_engine: "PRIMARY".to_string(),
                enabled: true,
            },
        )
        .await
        .unwrap();
        time_slots::create(
            &pool,
            "s1",
            &time_slots::TimeSlotInput {
                label: "Morning".to_string(),
                start_hour: 8,
                start_minute: 0,
                end_hour: 10,
                end_minute: 0,
                active_days: vec![1, 2, 3, 4, 5, 6, 7],
                enabled: true,
            },
        )
        .await
        .unwrap();
        daily_auto_schedules::create(
            &pool,
            daily_auto_schedules::NewDailyAutoSchedule {
                id: "d1",
                schedule_date: "2026-07-30",
                scheduled_time: "2000-01-01T00:00:00.000Z",
                selected_time_slot_id: "s1",
                selected_template_id: "t1",
                ucb_score: 1.0,
                selection_reason: "ucb1",
            },
        )
        .await
        .unwrap();
        posts::create(
            &pool,
            posts::NewPost {
                id: "p1",
                created_by: "ucb",
                template_id: Some("t1"),
                threads_account_id: None,
                is_ai_generated: true,
                tags: &[],
                context: None,
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
        daily_auto_schedules::attach_post(&pool, "d1", "p1").await.unwrap();
        daily_auto_schedules::transition(&pool, "d1", "GENERATED", "APPROVED").await.unwrap();

        let scheduler = scheduler(&pool, &server).await;
        let count = scheduler.dispatch_tick().await.unwrap();
        assert_eq!(count, 1);

        let schedule = daily_auto_schedules::get(&pool, "d1").await.unwrap();
        assert_eq!(schedule.status, "PUBLISHING");

        let job = queue::reserve(&pool, "publish", 60_000).await.unwrap();
        assert!(job.is_some());
    }

    #[tokio::test]
    async fn ensure_schedule_tick_is_a_noop_when_a_schedule_already_exists() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        templates::create(
            &pool,
            "t1",
            &templates::TemplateInput {
                name: "Tip".to_string(),
                prompt: "p".to_string(),
                preferred_engine: "PRIMARY".to_string(),
                enabled: true,
            },
        )
        .await
        .unwrap();
        time_slots::create(
            &pool,
            "s1",
            &time_slots::TimeSlotInput {
                label: "Morning".to_string(),
                start_hour: 8,
                start_minute: 0,
                end_hour: 10,
                end_minute: 0,
                active_days: vec![1, 2, 3, 4, 5, 6, 7],
                enabled: true,
            },
        )
        .await
        .unwrap();

        let scheduler = scheduler(&pool, &server).await;
        let today = Utc::now().with_timezone(&scheduler.timezone).format("%Y-%m-%d").to_string();
        daily_auto_schedules::create(
            &pool,
            daily_auto_schedules::NewDailyAutoSchedule {
                id: "d1",
                schedule_date: &today,
                scheduled_time: "2099-01-01T00:00:00.000Z",
                selected_time_slot_id: "s1",
                selected_template_id: "t1",
                ucb_score: 1.0,
                selection_reason: "ucb1",
            },
        )
        .await
        .unwrap();

        let created = scheduler.ensure_schedule_tick().await.unwrap();
        assert!(!created);
    }
}
