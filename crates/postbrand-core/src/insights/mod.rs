//! InsightsSync: periodically pulls engagement metrics for recently POSTED
//! posts and feeds the result back into the UCB template averages.
//!
//! Each post is synced independently; one post's failure (a revoked token,
//! a transient network error) is logged and skipped rather than aborting
//! the rest of the sweep.

use chrono::{Duration, Utc};

use crate::error::WorkflowError;
use crate::social::crypto::TokenCipher;
use crate::social::SocialClient;
use crate::store::{post_insights, posts, templates, threads_accounts, threads_auth, DbPool};

/// How far back POSTED posts are still eligible for a sync.
const SYNC_WINDOW_DAYS: i64 = 7;
/// Minimum spacing between syncs of the same post.
const SYNC_COOLDOWN_HOURS: i64 = 1;

/// Result of syncing one post's insights.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced { post_id: String, engagement_rate: f64 },
    Failed { post_id: String, message: String },
}

/// Syncs engagement metrics for POSTED posts.
pub struct InsightsSync {
    pool: DbPool,
    social: SocialClient,
    cipher: TokenCipher,
}

impl InsightsSync {
    pub fn new(pool: DbPool, social: SocialClient, cipher: TokenCipher) -> Self {
        Self { pool, social, cipher }
    }

    /// Sync every post due for a refresh and return one outcome per post.
    pub async fn sync_due(&self) -> Result<Vec<SyncOutcome>, WorkflowError> {
        let now = Utc::now();
        let window_cutoff = format_timestamp(now - Duration::days(SYNC_WINDOW_DAYS));
        let synced_cutoff = format_timestamp(now - Duration::hours(SYNC_COOLDOWN_HOURS));

        let due = post_insights::due_for_sync(&self.pool, &window_cutoff, &synced_cutoff).await?;

        let mut outcomes = Vec::with_capacity(due.len());
        for post_id in due {
            outcomes.push(self.sync_one(&post_id).await);
        }
        Ok(outcomes)
    }

    async fn sync_one(&self, post_id: &str) -> SyncOutcome {
        match self.do_sync_one(post_id).await {
            Ok(rate) => SyncOutcome::Synced { post_id: post_id.to_string(), engagement_rate: rate },
            Err(e) => SyncOutcome::Failed { post_id: post_id.to_string(), message: e.to_string() },
        }
    }

    async fn do_sync_one(&self, post_id: &str) -> Result<f64, WorkflowError> {
        let post = posts::get(&self.pool, post_id).await?;
        let media_id = post
            .media_id
            .as_deref()
            .ok_or_else(|| WorkflowError::Precondition(crate::error::PreconditionError::Conflict {
                message: format!("post {post_id} has no media_id to sync insights for"),
            }))?;

        let account = threads_accounts::get_default_active(&self.pool).await?;
        let auth = threads_auth::get(&self.pool, &account.id).await?;
        let token = self.cipher.decrypt(&auth.access_token).map_err(WorkflowError::Social)?;

        let metrics = self.social.fetch_insights(media_id, &token).await?;
        let synced_at = format_timestamp(Utc::now());
        post_insights::upsert(
            &self.pool,
            post_id,
            metrics.views,
            metrics.likes,
            metrics.replies,
            metrics.reposts,
            &synced_at,
        )
        .await?;

        let rate = (metrics.likes + metrics.replies + metrics.reposts) as f64 / metrics.views.max(1) as f64;
        if let Some(template_id) = &post.template_id {
            templates::record_engagement(&self.pool, template_id, rate).await?;
        }

        Ok(rate)
    }
}

fn format_timestamp(ts: chrono::DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%.3fZ").to_string()
}
