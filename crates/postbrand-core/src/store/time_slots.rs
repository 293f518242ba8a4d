//! Storage operations for configured posting time slots.

use super::DbPool;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// A configured time-of-day window eligible for auto-scheduling.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimeSlot {
    pub id: String,
    pub label: String,
    pub start_hour: i64,
    pub start_minute: i64,
    pub end_hour: i64,
    pub end_minute: i64,
    #[sqlx(json)]
    pub active_days: Vec<i64>,
    pub enabled: bool,
}

/// Fields accepted on create/update.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeSlotInput {
    pub label: String,
    pub start_hour: i64,
    pub start_minute: i64,
    pub end_hour: i64,
    pub end_minute: i64,
    pub active_days: Vec<i64>,
    pub enabled: bool,
}

/// Create a time slot.
pub async fn create(pool: &DbPool, id: &str, input: &TimeSlotInput) -> Result<(), StoreError> {
    let active_days = serde_json::to_string(&input.active_days).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "INSERT INTO time_slots (id, label, start_hour, start_minute, end_hour, end_minute, active_days, enabled)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&input.label)
    .bind(input.start_hour)
    .bind(input.start_minute)
    .bind(input.end_hour)
    .bind(input.end_minute)
    .bind(active_days)
    .bind(input.enabled)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch a time slot by id.
pub async fn get(pool: &DbPool, id: &str) -> Result<TimeSlot, StoreError> {
    sqlx::query_as("SELECT * FROM time_slots WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "time_slot",
            id: id.to_string(),
        })
}

/// List all time slots ordered by start time.
pub async fn list(pool: &DbPool) -> Result<Vec<TimeSlot>, StoreError> {
    sqlx::query_as("SELECT * FROM time_slots ORDER BY start_hour, start_minute")
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// List enabled slots whose `active_days` includes `day_of_week` (1=Monday..7=Sunday,
/// ISO-8601 convention), used by the UCB selector when building today's candidate set.
/// The `active_days` membership check happens in-process after loading the enabled
/// rows, since SQLite's JSON support for array containment is awkward to index.
pub async fn enabled_for_day(pool: &DbPool, day_of_week: i64) -> Result<Vec<TimeSlot>, StoreError> {
    let slots: Vec<TimeSlot> =
        sqlx::query_as("SELECT * FROM time_slots WHERE enabled = 1 ORDER BY start_hour, start_minute")
            .fetch_all(pool)
            .await
            .map_err(|e| StoreError::Query { source: e })?;
    Ok(slots
        .into_iter()
        .filter(|s| s.active_days.contains(&day_of_week))
        .collect())
}

/// Update a time slot's editable fields.
pub async fn update(pool: &DbPool, id: &str, input: &TimeSlotInput) -> Result<(), StoreError> {
    let active_days = serde_json::to_string(&input.active_days).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "UPDATE time_slots SET label = ?, start_hour = ?, start_minute = ?, end_hour = ?, end_minute = ?, active_days = ?, enabled = ?
         WHERE id = ?",
    )
    .bind(&input.label)
    .bind(input.start_hour)
    .bind(input.start_minute)
    .bind(input.end_hour)
    .bind(input.end_minute)
    .bind(active_days)
    .bind(input.enabled)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Delete a time slot.
pub async fn delete(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM time_slots WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_test_db;

    fn input(active_days: Vec<i64>) -> TimeSlotInput {
        TimeSlotInput {
            label: "Morning".to_string(),
            start_hour: 8,
            start_minute: 0,
            end_hour: 10,
            end_minute: 0,
            active_days,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn enabled_for_day_filters_by_active_days_membership() {
        let pool = init_test_db().await.unwrap();
        create(&pool, "s1", &input(vec![1, 2, 3])).await.unwrap();
        create(&pool, "s2", &input(vec![6, 7])).await.unwrap();

        let monday = enabled_for_day(&pool, 1).await.unwrap();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].id, "s1");

        let saturday = enabled_for_day(&pool, 6).await.unwrap();
        assert_eq!(saturday.len(), 1);
        assert_eq!(saturday[0].id, "s2");
    }

    #[tokio::test]
    async fn disabled_slot_is_excluded() {
        let pool = init_test_db().await.unwrap();
        let mut disabled = input(vec![1]);
        disabled.enabled = false;
        create(&pool, "s1", &disabled).await.unwrap();

        let monday = enabled_for_day(&pool, 1).await.unwrap();
        assert!(monday.is_empty());
    }
}
