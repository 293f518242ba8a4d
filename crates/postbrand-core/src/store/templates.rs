//! Storage operations for content templates.
//!
//! `total_uses`/`avg_engagement_rate` updates from the UCB feedback loop
//! and from InsightsSync are serialized per template by `BEGIN IMMEDIATE`
//! transactions, giving the read-modify-write a row-level lock as the
//! concurrency model requires.

use super::DbPool;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// A content template row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub preferred_engine: String,
    pub enabled: bool,
    pub total_uses: i64,
    pub avg_engagement_rate: f64,
}

/// Fields accepted on create/update.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub prompt: String,
    pub preferred_engine: String,
    pub enabled: bool,
}

/// Create a template.
pub async fn create(pool: &DbPool, id: &str, input: &TemplateInput) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO templates (id, name, prompt, preferred_engine, enabled) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.prompt)
    .bind(&input.preferred_engine)
    .bind(input.enabled)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch a template by id.
pub async fn get(pool: &DbPool, id: &str) -> Result<Template, StoreError> {
    sqlx::query_as("SELECT * FROM templates WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "template",
            id: id.to_string(),
        })
}

/// List all templates, enabled-first then by id for deterministic ordering.
pub async fn list(pool: &DbPool) -> Result<Vec<Template>, StoreError> {
    sqlx::query_as("SELECT * FROM templates ORDER BY enabled DESC, id ASC")
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// List enabled templates, used by the UCB selector.
pub async fn list_enabled(pool: &DbPool) -> Result<Vec<Template>, StoreError> {
    sqlx::query_as("SELECT * FROM templates WHERE enabled = 1 ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// Update a template's editable fields.
pub async fn update(pool: &DbPool, id: &str, input: &TemplateInput) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE templates SET name = ?, prompt = ?, preferred_engine = ?, enabled = ? WHERE id = ?",
    )
    .bind(&input.name)
    .bind(&input.prompt)
    .bind(&input.preferred_engine)
    .bind(input.enabled)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Delete a template.
pub async fn delete(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM templates WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Record a new engagement sample for a template: increments `total_uses`
/// and recomputes `avg_engagement_rate` as a running mean, serialized via
/// `BEGIN IMMEDIATE` so concurrent InsightsSync sweeps don't race the
/// read-modify-write.
pub async fn record_engagement(
    pool: &DbPool,
    id: &str,
    engagement_rate: f64,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(|e| StoreError::Query { source: e })?;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *tx)
        .await
        .ok();

    let current: (i64, f64) =
        sqlx::query_as("SELECT total_uses, avg_engagement_rate FROM templates WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Query { source: e })?;

    let (total_uses, avg) = current;
    let new_total = total_uses + 1;
    let new_avg = (avg * total_uses as f64 + engagement_rate) / new_total as f64;

    sqlx::query("UPDATE templates SET total_uses = ?, avg_engagement_rate = ? WHERE id = ?")
        .bind(new_total)
        .bind(new_avg)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Query { source: e })?;

    tx.commit().await.map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}
