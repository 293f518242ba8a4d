//! Storage for the singleton UCB scheduler configuration row.
//!
//! The table is constrained to exactly one row (`CHECK (id = 1)`), seeded by
//! the initial migration, so `get`/`update` never need to handle absence.

use super::DbPool;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// The singleton scheduler configuration.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchedulerConfig {
    pub exploration_factor: f64,
    pub min_trials_per_template: i64,
    pub posts_per_day: i64,
    pub time_range_start: String,
    pub time_range_end: String,
    #[sqlx(json)]
    pub active_days: Vec<i64>,
    pub auto_schedule_enabled: bool,
    pub ai_prompt: Option<String>,
    pub ai_engine: Option<String>,
    pub line_user_id: Option<String>,
    pub threads_account_id: Option<String>,
}

/// Fields accepted on update.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfigInput {
    pub exploration_factor: f64,
    pub min_trials_per_template: i64,
    pub posts_per_day: i64,
    pub time_range_start: String,
    pub time_range_end: String,
    pub active_days: Vec<i64>,
    pub auto_schedule_enabled: bool,
    pub ai_prompt: Option<String>,
    pub ai_engine: Option<String>,
    pub line_user_id: Option<String>,
    pub threads_account_id: Option<String>,
}

/// Fetch the singleton scheduler configuration.
pub async fn get(pool: &DbPool) -> Result<SchedulerConfig, StoreError> {
    sqlx::query_as("SELECT * FROM scheduler_config WHERE id = 1")
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// Replace the singleton scheduler configuration.
pub async fn update(pool: &DbPool, input: &SchedulerConfigInput) -> Result<(), StoreError> {
    let active_days = serde_json::to_string(&input.active_days).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "UPDATE scheduler_config SET
           exploration_factor = ?, min_trials_per_template = ?, posts_per_day = ?,
           time_range_start = ?, time_range_end = ?, active_days = ?,
           auto_schedule_enabled = ?, ai_prompt = ?, ai_engine = ?, line_user_id = ?,
           threads_account_id = ?
         WHERE id = 1",
    )
    .bind(input.exploration_factor)
    .bind(input.min_trials_per_template)
    .bind(input.posts_per_day)
    .bind(&input.time_range_start)
    .bind(&input.time_range_end)
    .bind(active_days)
    .bind(input.auto_schedule_enabled)
    .bind(&input.ai_prompt)
    .bind(&input.ai_engine)
    .bind(&input.line_user_id)
    .bind(&input.threads_account_id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}
