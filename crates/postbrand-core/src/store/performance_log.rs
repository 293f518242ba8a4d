//! Append-only log of UCB selections, one row per published auto-scheduled
//! post, used to audit the bandit's exploration/exploitation behavior over
//! time.

use super::DbPool;
use crate::error::StoreError;
use serde::Serialize;

/// A single UCB selection outcome.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PerformanceLogEntry {
    pub id: String,
    pub post_id: String,
    pub template_id: String,
    pub time_slot_id: String,
    pub posted_at: String,
    pub posted_hour: i64,
    pub posted_minute: i64,
    pub day_of_week: i64,
    pub ucb_score: f64,
    pub was_exploration: bool,
    pub selection_reason: String,
}

/// Fields required to append a log entry.
pub struct NewPerformanceLogEntry<'a> {
    pub id: &'a str,
    pub post_id: &'a str,
    pub template_id: &'a str,
    pub time_slot_id: &'a str,
    pub posted_at: &'a str,
    pub posted_hour: i64,
    pub posted_minute: i64,
    pub day_of_week: i64,
    pub ucb_score: f64,
    pub was_exploration: bool,
    pub selection_reason: &'a str,
}

/// Append a new entry. The log is write-only from the application's
/// perspective; rows are never updated or deleted.
pub async fn insert(pool: &DbPool, entry: NewPerformanceLogEntry<'_>) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO performance_log
           (id, post_id, template_id, time_slot_id, posted_at, posted_hour, posted_minute, day_of_week, ucb_score, was_exploration, selection_reason)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.id)
    .bind(entry.post_id)
    .bind(entry.template_id)
    .bind(entry.time_slot_id)
    .bind(entry.posted_at)
    .bind(entry.posted_hour)
    .bind(entry.posted_minute)
    .bind(entry.day_of_week)
    .bind(entry.ucb_score)
    .bind(entry.was_exploration)
    .bind(entry.selection_reason)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// List all log entries for a template, most recent first.
pub async fn list_for_template(
    pool: &DbPool,
    template_id: &str,
) -> Result<Vec<PerformanceLogEntry>, StoreError> {
    sqlx::query_as("SELECT * FROM performance_log WHERE template_id = ? ORDER BY posted_at DESC")
        .bind(template_id)
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, posts, templates, time_slots};

    async fn seed(pool: &DbPool) {
        posts::create(
            pool,
            posts::NewPost {
                id: "p1",
                created_by: "admin",
                template_id: None,
                threads_account_id: None,
                is_ai_generated: true,
                tags: &[],
                context: None,
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
        templates::create(
            pool,
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
            pool,
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
    }

    #[tokio::test]
    async fn insert_then_list_for_template() {
        let pool = init_test_db().await.unwrap();
        seed(&pool).await;

        insert(
            &pool,
            NewPerformanceLogEntry {
                id: "log1",
                post_id: "p1",
                template_id: "t1",
                time_slot_id: "s1",
                posted_at: "2026-07-30T09:00:00Z",
                posted_hour: 9,
                posted_minute: 0,
                day_of_week: 4,
                ucb_score: 1.73,
                was_exploration: true,
                selection_reason: "forced-exploration",
            },
        )
        .await
        .unwrap();

        let entries = list_for_template(&pool, "t1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].was_exploration);
    }
}
