//! TokenLifecycle: finds Threads access tokens nearing expiry and refreshes
//! them before the platform revokes them.
//!
//! `scan` runs on the periodic tick cadence and enqueues one `tokenRefresh`
//! job per account due for a refresh; `refresh_account` is the job handler
//! a worker calls to do the actual refresh. Splitting the two lets a stuck
//! refresh (a downstream outage, say) retry through the job queue's normal
//! lease/backoff machinery instead of blocking the whole scan.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::chat::ChatNotifier;
use crate::config::ChatConfig;
use crate::error::WorkflowError;
use crate::queue::payloads::TokenRefreshJobPayload;
use crate::queue::{self, EnqueueOptions};
use crate::social::crypto::TokenCipher;
use crate::social::SocialClient;
use crate::store::{threads_auth, DbPool};

/// How far ahead of expiry a token becomes eligible for refresh.
const REFRESH_WINDOW_DAYS: i64 = 7;
/// Minimum spacing between refresh attempts for the same account.
const REFRESH_COOLDOWN_HOURS: i64 = 24;

/// Outcome of one account's refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenRefreshOutcome {
    Refreshed { account_id: String },
    ActionRequired { account_id: String, message: String },
}

/// Scans for and refreshes expiring Threads access tokens.
pub struct TokenLifecycle {
    pool: DbPool,
    social: SocialClient,
    cipher: TokenCipher,
    chat: Option<ChatNotifier>,
    admin_user_id: Option<String>,
}

impl TokenLifecycle {
    pub fn new(pool: DbPool, social: SocialClient, cipher: TokenCipher) -> Self {
        Self {
            pool,
            social,
            cipher,
            chat: None,
            admin_user_id: None,
        }
    }

    pub fn with_chat(mut self, chat: ChatNotifier, chat_config: &ChatConfig) -> Self {
        self.chat = Some(chat);
        self.admin_user_id = chat_config.admin_user_id.clone();
        self
    }

    /// Find accounts due for a refresh and enqueue one job each. Returns
    /// the number enqueued.
    pub async fn scan(&self) -> Result<usize, WorkflowError> {
        let now = Utc::now();
        let now_str = format_timestamp(now);
        let expiry_cutoff = format_timestamp(now + Duration::days(REFRESH_WINDOW_DAYS));
        let refreshed_cutoff = format_timestamp(now - Duration::hours(REFRESH_COOLDOWN_HOURS));

        let due = threads_auth::due_for_refresh(&self.pool, &now_str, &expiry_cutoff, &refreshed_cutoff).await?;

        for auth in &due {
            queue::enqueue(
                &self.pool,
                &Uuid::new_v4().to_string(),
                "tokenRefresh",
                &TokenRefreshJobPayload { account_id: auth.account_id.clone() },
                EnqueueOptions::default(),
            )
            .await?;
        }

        Ok(due.len())
    }

    /// Refresh one account's token. Isolated from `scan` so a failure here
    /// never aborts the scan for other accounts.
    pub async fn refresh_account(&self, account_id: &str) -> Result<TokenRefreshOutcome, WorkflowError> {
        let auth = threads_auth::get(&self.pool, account_id).await?;
        let plaintext = self.cipher.decrypt(&auth.access_token).map_err(WorkflowError::Social)?;

        match self.social.refresh(&plaintext).await {
            Ok((new_token, expires_at)) => {
                let encrypted = self.cipher.encrypt(&new_token).map_err(WorkflowError::Social)?;
                threads_auth::upsert(&self.pool, account_id, &encrypted, &format_timestamp(expires_at)).await?;
                Ok(TokenRefreshOutcome::Refreshed { account_id: account_id.to_string() })
            }
            Err(e) => {
                threads_auth::mark_action_required(&self.pool, account_id).await?;
                let message = e.to_string();
                if let (Some(chat), Some(admin_user_id)) = (&self.chat, &self.admin_user_id) {
                    let _ = chat
                        .send_text(admin_user_id, &format!("account {account_id} token refresh failed: {message}"))
                        .await;
                }
                Ok(TokenRefreshOutcome::ActionRequired { account_id: account_id.to_string(), message })
            }
        }
    }
}

fn format_timestamp(ts: chrono::DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%.3fZ").to_string()
}
