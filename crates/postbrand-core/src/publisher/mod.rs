//! Publisher: claims an APPROVED (or previously-FAILED, for a retried job)
//! post, posts it through the social client, and records the outcome on
//! the post, the owning `DailyAutoSchedule` (if any), and the UCB
//! performance log.
//!
//! A rate-limit or network failure returns `Err` so the caller's queue job
//! is requeued with backoff; anything else (bad auth, expired token,
//! unclassified platform errors) is terminal and reported as
//! `PublishOutcome::Failed`.

use chrono::{Datelike, Timelike, Utc};

use crate::chat::ChatNotifier;
use crate::config::{ChatConfig, PipelineConfig};
use crate::error::{SocialErrorKind, WorkflowError};
use crate::social::crypto::TokenCipher;
use crate::social::SocialClient;
use crate::store::{daily_auto_schedules, performance_log, posts, revisions, threads_accounts, threads_auth, DbPool};

/// Result of one publish attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// The post was published successfully.
    Published { post_id: String, permalink: String, media_id: String },
    /// The post was no longer APPROVED by the time this ran (already
    /// published by a racing worker, skipped, etc.); a no-op.
    Stale { post_id: String },
    /// Publishing failed; the post was marked FAILED or ACTION_REQUIRED.
    Failed { post_id: String, error_code: String, message: String },
}

/// Publishes APPROVED posts to the configured social account.
pub struct Publisher {
    pool: DbPool,
    social: SocialClient,
    cipher: TokenCipher,
    retry_attempts: u32,
    chat: Option<ChatNotifier>,
    admin_user_id: Option<String>,
}

impl Publisher {
    pub fn new(pool: DbPool, social: SocialClient, cipher: TokenCipher, pipeline_config: &PipelineConfig) -> Self {
        Self {
            pool,
            social,
            cipher,
            retry_attempts: pipeline_config.publish_retry_attempts,
            chat: None,
            admin_user_id: None,
        }
    }

    /// Attach a chat channel used to notify the admin when a token expires
    /// mid-publish.
    pub fn with_chat(mut self, chat: ChatNotifier, chat_config: &ChatConfig) -> Self {
        self.chat = Some(chat);
        self.admin_user_id = chat_config.admin_user_id.clone();
        self
    }

    /// Publish `post_id`. Idempotent against stale duplicate jobs: a post
    /// no longer in APPROVED status is treated as already handled.
    pub async fn publish(&self, post_id: &str) -> Result<PublishOutcome, WorkflowError> {
        if let Err(e) = posts::claim_for_publishing(&self.pool, post_id).await {
            if matches!(e, crate::error::StoreError::Precondition(_)) {
                return Ok(PublishOutcome::Stale { post_id: post_id.to_string() });
            }
            return Err(e.into());
        }

        match self.do_publish(post_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(e),
        }
    }

    async fn do_publish(&self, post_id: &str) -> Result<PublishOutcome, WorkflowError> {
        let post = posts::get(&self.pool, post_id).await?;

        let account = match &post.threads_account_id {
            Some(account_id) => threads_accounts::get(&self.pool, account_id).await?,
            None => threads_accounts::get_default_active(&self.pool).await?,
        };

        let auth = threads_auth::get(&self.pool, &account.id).await?;
        if auth.status != "OK" {
            let message = format!("account {} auth status is {}", account.id, auth.status);
            return self.fail(post_id, "ACTION_REQUIRED", &message).await;
        }

        let token = self
            .cipher
            .decrypt(&auth.access_token)
            .map_err(WorkflowError::Social)?;

        let revision = revisions::latest(&self.pool, post_id)
            .await?
            .ok_or_else(|| WorkflowError::Precondition(crate::error::PreconditionError::Conflict {
                message: format!("post {post_id} has no revision to publish"),
            }))?;

        match self
            .social
            .publish(&account.external_account_id, &token, &revision.content, self.retry_attempts)
            .await
        {
            Ok(media) => {
                posts::mark_posted(&self.pool, post_id, &media.permalink, &media.media_id).await?;

                if let Some(schedule) = daily_auto_schedules::for_post(&self.pool, post_id).await? {
                    let now = Utc::now();
                    let executed_at = now.format("%Y-%m-%dT%H:%M:%.3fZ").to_string();
                    daily_auto_schedules::mark_published(&self.pool, &schedule.id, &executed_at).await?;

                    performance_log::insert(
                        &self.pool,
                        performance_log::NewPerformanceLogEntry {
                            id: &uuid::Uuid::new_v4().to_string(),
                            post_id,
                            template_id: &schedule.selected_template_id,
                            time_slot_id: &schedule.selected_time_slot_id,
                            posted_at: &executed_at,
                            posted_hour: now.hour() as i64,
                            posted_minute: now.minute() as i64,
                            day_of_week: now.weekday().number_from_monday() as i64,
                            ucb_score: schedule.ucb_score,
                            was_exploration: schedule.selection_reason.contains("exploration"),
                            selection_reason: &schedule.selection_reason,
                        },
                    )
                    .await?;
                }

                Ok(PublishOutcome::Published {
                    post_id: post_id.to_string(),
                    permalink: media.permalink,
                    media_id: media.media_id,
                })
            }
            Err(e) if e.kind() == SocialErrorKind::TokenExpired => {
                threads_auth::mark_action_required(&self.pool, &account.id).await?;
                if let (Some(chat), Some(admin_user_id)) = (&self.chat, &self.admin_user_id) {
                    let _ = chat
                        .send_text(admin_user_id, &format!("account {} needs reauthorization", account.id))
                        .await;
                }
                self.fail(post_id, "TOKEN_EXPIRED", &e.to_string()).await
            }
            Err(e) => {
                let retryable = matches!(e.kind(), SocialErrorKind::RateLimit | SocialErrorKind::NetworkError);
                let outcome = self.fail(post_id, "PUBLISH_FAILED", &e.to_string()).await?;
                if retryable {
                    // queue::fail will requeue this job with backoff; the post
                    // stays FAILED until claim_for_publishing reclaims it.
                    Err(WorkflowError::Social(e))
                } else {
                    Ok(outcome)
                }
            }
        }
    }

    async fn fail(&self, post_id: &str, error_code: &str, message: &str) -> Result<PublishOutcome, WorkflowError> {
        let next_status = if error_code == "ACTION_REQUIRED" || error_code == "TOKEN_EXPIRED" {
            "ACTION_REQUIRED"
        } else {
            "FAILED"
        };
        posts::mark_failed(&self.pool, post_id, next_status, error_code, message).await?;

        if let Some(schedule) = daily_auto_schedules::for_post(&self.pool, post_id).await? {
            daily_auto_schedules::mark_failed(&self.pool, &schedule.id, message).await?;
        }

        Ok(PublishOutcome::Failed {
            post_id: post_id.to_string(),
            error_code: error_code.to_string(),
            message: message.to_string(),
        })
    }
}
