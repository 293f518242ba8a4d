//! Storage operations for revisions.
//!
//! Revision numbering is append-only: the next `revision_no` is computed as
//! `max(revision_no) + 1` under the unique `(post_id, revision_no)`
//! constraint, so a racing insert fails with a unique violation rather than
//! silently reusing a number.

use super::DbPool;
use crate::error::StoreError;
use serde::Serialize;

/// A revision row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Revision {
    pub id: String,
    pub post_id: String,
    pub revision_no: i64,
    pub content: String,
    pub engine_used: String,
    pub similarity_max: Option<f64>,
    pub created_at: String,
}

/// Insert the next revision for a post, computing `revision_no` from the
/// current maximum within the same transaction as the insert.
pub async fn append(
    pool: &DbPool,
    id: &str,
    post_id: &str,
    content: &str,
    engine_used: &str,
    similarity_max: Option<f64>,
) -> Result<i64, StoreError> {
    let mut tx = pool.begin().await.map_err(|e| StoreError::Query { source: e })?;

    let current_max: (Option<i64>,) =
        sqlx::query_as("SELECT MAX(revision_no) FROM revisions WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Query { source: e })?;

    let next_no = current_max.0.unwrap_or(0) + 1;

    sqlx::query(
        "INSERT INTO revisions (id, post_id, revision_no, content, engine_used, similarity_max)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(post_id)
    .bind(next_no)
    .bind(content)
    .bind(engine_used)
    .bind(similarity_max)
    .execute(&mut *tx)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    tx.commit().await.map_err(|e| StoreError::Query { source: e })?;

    Ok(next_no)
}

/// Fetch the latest revision for a post.
pub async fn latest(pool: &DbPool, post_id: &str) -> Result<Option<Revision>, StoreError> {
    sqlx::query_as(
        "SELECT * FROM revisions WHERE post_id = ? ORDER BY revision_no DESC LIMIT 1",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

/// Fetch a single revision by id.
pub async fn get(pool: &DbPool, id: &str) -> Result<Revision, StoreError> {
    sqlx::query_as("SELECT * FROM revisions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "revision",
            id: id.to_string(),
        })
}

/// List all revisions for a post, ordered by revision_no ascending.
pub async fn list_for_post(pool: &DbPool, post_id: &str) -> Result<Vec<Revision>, StoreError> {
    sqlx::query_as("SELECT * FROM revisions WHERE post_id = ? ORDER BY revision_no ASC")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}
