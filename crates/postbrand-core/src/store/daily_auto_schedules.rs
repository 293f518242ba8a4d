//! Storage for UCB-generated daily auto-schedules.
//!
//! Invariant 7 ("at most one non-terminal schedule per calendar day") is
//! enforced by the partial unique index on `schedule_date`, not by
//! application logic: [`create`] relies on the index to reject a second
//! concurrent "ensure today's schedule" attempt, surfacing as
//! [`crate::error::StoreError::Integrity`].

use super::DbPool;
use crate::error::{IntegrityError, StoreError};
use serde::Serialize;

/// A single day's UCB-selected (template, time-slot) assignment.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyAutoSchedule {
    pub id: String,
    pub schedule_date: String,
    pub post_id: Option<String>,
    pub scheduled_time: String,
    pub selected_time_slot_id: String,
    pub selected_template_id: String,
    pub ucb_score: f64,
    pub selection_reason: String,
    pub status: String,
    pub executed_at: Option<String>,
    pub error_message: Option<String>,
}

/// Fields required to create a schedule row.
pub struct NewDailyAutoSchedule<'a> {
    pub id: &'a str,
    pub schedule_date: &'a str,
    pub scheduled_time: &'a str,
    pub selected_time_slot_id: &'a str,
    pub selected_template_id: &'a str,
    pub ucb_score: f64,
    pub selection_reason: &'a str,
}

/// Insert a new PENDING schedule for a day. Returns
/// [`StoreError::Integrity`] if a non-terminal schedule already exists for
/// that day (enforced by `idx_daily_auto_schedules_active_day`).
pub async fn create(pool: &DbPool, input: NewDailyAutoSchedule<'_>) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO daily_auto_schedules
           (id, schedule_date, scheduled_time, selected_time_slot_id, selected_template_id, ucb_score, selection_reason, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'PENDING')",
    )
    .bind(input.id)
    .bind(input.schedule_date)
    .bind(input.scheduled_time)
    .bind(input.selected_time_slot_id)
    .bind(input.selected_template_id)
    .bind(input.ucb_score)
    .bind(input.selection_reason)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::Integrity(IntegrityError::UniqueViolation {
                    constraint: "idx_daily_auto_schedules_active_day".to_string(),
                });
            }
        }
        StoreError::Query { source: e }
    })?;
    Ok(())
}

/// Fetch a schedule by id.
pub async fn get(pool: &DbPool, id: &str) -> Result<DailyAutoSchedule, StoreError> {
    sqlx::query_as("SELECT * FROM daily_auto_schedules WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "daily_auto_schedule",
            id: id.to_string(),
        })
}

/// Fetch the active (non-terminal) schedule for a calendar day, if any.
/// Used by the "ensure today's schedule exists" tick to decide whether the
/// UCB selector needs to run.
pub async fn active_for_date(
    pool: &DbPool,
    schedule_date: &str,
) -> Result<Option<DailyAutoSchedule>, StoreError> {
    sqlx::query_as(
        "SELECT * FROM daily_auto_schedules
         WHERE schedule_date = ? AND status NOT IN ('CANCELLED', 'EXPIRED', 'FAILED')",
    )
    .bind(schedule_date)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

/// Attach the generated post to a PENDING schedule and move it to GENERATED.
pub async fn attach_post(pool: &DbPool, id: &str, post_id: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE daily_auto_schedules SET post_id = ?, status = 'GENERATED' WHERE id = ? AND status = 'PENDING'",
    )
    .bind(post_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "daily_auto_schedule",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Conditionally transition a schedule's status.
pub async fn transition(
    pool: &DbPool,
    id: &str,
    expected: &str,
    next: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE daily_auto_schedules SET status = ? WHERE id = ? AND status = ?")
        .bind(next)
        .bind(id)
        .bind(expected)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        let actual: Option<(String,)> =
            sqlx::query_as("SELECT status FROM daily_auto_schedules WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| StoreError::Query { source: e })?;
        let actual = actual
            .map(|(s,)| s)
            .unwrap_or_else(|| "unknown".to_string());
        return Err(StoreError::Precondition(crate::error::PreconditionError::WrongStatus {
            entity: "daily_auto_schedule",
            id: id.to_string(),
            expected: expected.to_string(),
            actual,
        }));
    }
    Ok(())
}

/// Mark a schedule FAILED with an error message.
pub async fn mark_failed(pool: &DbPool, id: &str, error_message: &str) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE daily_auto_schedules SET status = 'FAILED', error_message = ? WHERE id = ?",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Mark a schedule PUBLISHED, stamping `executed_at`.
pub async fn mark_published(pool: &DbPool, id: &str, executed_at: &str) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE daily_auto_schedules SET status = 'PUBLISHED', executed_at = ? WHERE id = ?",
    )
    .bind(executed_at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch the schedule a post was generated for, if any. `ReviewCoordinator`
/// and `Publisher` use this to decide whether a post's approval/publish
/// outcome should also move the owning schedule row.
pub async fn for_post(pool: &DbPool, post_id: &str) -> Result<Option<DailyAutoSchedule>, StoreError> {
    sqlx::query_as("SELECT * FROM daily_auto_schedules WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// List the most recent schedules by date, for the admin API's history view.
pub async fn list_recent(pool: &DbPool, limit: i64) -> Result<Vec<DailyAutoSchedule>, StoreError> {
    sqlx::query_as("SELECT * FROM daily_auto_schedules ORDER BY schedule_date DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// Fetch GENERATED schedules whose attached post is still PENDING_REVIEW
/// and whose `scheduled_time` is at or before `deadline` (the sweep calls
/// this with `now + 10min`) — about to come due with no reviewed content
/// ready to dispatch.
pub async fn list_unreviewed_nearing_deadline(
    pool: &DbPool,
    deadline: &str,
) -> Result<Vec<DailyAutoSchedule>, StoreError> {
    sqlx::query_as(
        "SELECT das.* FROM daily_auto_schedules das
         JOIN posts p ON p.id = das.post_id
         WHERE das.status = 'GENERATED' AND das.scheduled_time <= ? AND p.status = 'PENDING_REVIEW'",
    )
    .bind(deadline)
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

/// Fetch schedules due for dispatch: APPROVED and `scheduled_time <= now`.
pub async fn due_for_dispatch(pool: &DbPool, now: &str) -> Result<Vec<DailyAutoSchedule>, StoreError> {
    sqlx::query_as(
        "SELECT * FROM daily_auto_schedules WHERE status = 'APPROVED' AND scheduled_time <= ?",
    )
    .bind(now)
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, templates, time_slots};

    async fn seed(pool: &DbPool) {
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

    fn new_schedule<'a>(id: &'a str, date: &'a str) -> NewDailyAutoSchedule<'a> {
        NewDailyAutoSchedule {
            id,
            schedule_date: date,
            scheduled_time: "2026-07-30T09:00:00Z",
            selected_time_slot_id: "s1",
            selected_template_id: "t1",
            ucb_score: 1.5,
            selection_reason: "ucb1",
        }
    }

    #[tokio::test]
    async fn second_active_schedule_same_day_is_rejected() {
        let pool = init_test_db().await.unwrap();
        seed(&pool).await;

        create(&pool, new_schedule("d1", "2026-07-30")).await.unwrap();
        let err = create(&pool, new_schedule("d2", "2026-07-30")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Integrity(IntegrityError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_schedule_frees_the_day() {
        let pool = init_test_db().await.unwrap();
        seed(&pool).await;

        create(&pool, new_schedule("d1", "2026-07-30")).await.unwrap();
        transition(&pool, "d1", "PENDING", "CANCELLED").await.unwrap();

        create(&pool, new_schedule("d2", "2026-07-30")).await.unwrap();
        let active = active_for_date(&pool, "2026-07-30").await.unwrap();
        assert_eq!(active.unwrap().id, "d2");
    }

    #[tokio::test]
    async fn for_post_finds_the_owning_schedule() {
        let pool = init_test_db().await.unwrap();
        seed(&pool).await;
        create(&pool, new_schedule("d1", "2026-07-30")).await.unwrap();

        crate::store::posts::create(
            &pool,
            crate::store::posts::NewPost {
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
        attach_post(&pool, "d1", "p1").await.unwrap();

        let found = for_post(&pool, "p1").await.unwrap();
        assert_eq!(found.unwrap().id, "d1");
        assert!(for_post(&pool, "no-such-post").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transition_rejects_mismatched_expected_status() {
        let pool = init_test_db().await.unwrap();
        seed(&pool).await;
        create(&pool, new_schedule("d1", "2026-07-30")).await.unwrap();

        let err = transition(&pool, "d1", "APPROVED", "PUBLISHING")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Precondition(crate::error::PreconditionError::WrongStatus { .. })
        ));
    }
}
