//! Storage operations for review requests.
//!
//! A token is single-use: `mark_used` is a conditional UPDATE requiring
//! `status = 'PENDING'`, so a replayed webhook action observes zero rows
//! affected and the caller treats it as a stale duplicate.

use super::DbPool;
use crate::error::{PreconditionError, StoreError};
use serde::Serialize;

/// A review request row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewRequest {
    pub id: String,
    pub post_id: String,
    pub revision_id: String,
    pub token: String,
    pub reviewer_user_id: String,
    pub status: String,
    pub expires_at: String,
    pub edited_content: Option<String>,
    pub created_at: String,
}

/// Create a new PENDING review request.
pub async fn create(
    pool: &DbPool,
    id: &str,
    post_id: &str,
    revision_id: &str,
    token: &str,
    reviewer_user_id: &str,
    expires_at: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO review_requests (id, post_id, revision_id, token, reviewer_user_id, status, expires_at)
         VALUES (?, ?, ?, ?, ?, 'PENDING', ?)",
    )
    .bind(id)
    .bind(post_id)
    .bind(revision_id)
    .bind(token)
    .bind(reviewer_user_id)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch a review request by its one-shot token.
pub async fn get_by_token(pool: &DbPool, token: &str) -> Result<ReviewRequest, StoreError> {
    sqlx::query_as("SELECT * FROM review_requests WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "review_request",
            id: token.to_string(),
        })
}

/// Find the single active PENDING review request for a reviewer, used by
/// the webhook free-text edit-then-confirm flow.
pub async fn active_for_reviewer(
    pool: &DbPool,
    reviewer_user_id: &str,
) -> Result<Option<ReviewRequest>, StoreError> {
    sqlx::query_as(
        "SELECT * FROM review_requests WHERE reviewer_user_id = ? AND status = 'PENDING' ORDER BY created_at DESC LIMIT 1",
    )
    .bind(reviewer_user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

/// Find the single active PENDING review request for a post, used by the
/// admin API's token-less approve/skip actions.
pub async fn active_for_post(pool: &DbPool, post_id: &str) -> Result<Option<ReviewRequest>, StoreError> {
    sqlx::query_as(
        "SELECT * FROM review_requests WHERE post_id = ? AND status = 'PENDING' ORDER BY created_at DESC LIMIT 1",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

/// Record free-typed text as the active request's edited content.
pub async fn set_edited_content(
    pool: &DbPool,
    id: &str,
    edited_content: &str,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE review_requests SET edited_content = ? WHERE id = ? AND status = 'PENDING'")
        .bind(edited_content)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Atomically consume a token: PENDING -> USED, but only if it has not
/// expired. Returns a precondition error if the token was already used,
/// unknown, or its `expires_at` has passed by the time this runs — expiry
/// is enforced here at the moment of use, not only by the periodic sweep
/// that flips stale PENDING rows to EXPIRED.
pub async fn mark_used(pool: &DbPool, token: &str, now: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE review_requests SET status = 'USED' WHERE token = ? AND status = 'PENDING' AND expires_at >= ?",
    )
    .bind(token)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Precondition(PreconditionError::StaleToken {
            state: "used-or-expired",
        }));
    }
    Ok(())
}

/// List PENDING review requests whose `expires_at` has passed, so the
/// caller can act on the owning post before marking them EXPIRED.
pub async fn list_overdue(pool: &DbPool, now: &str) -> Result<Vec<ReviewRequest>, StoreError> {
    sqlx::query_as("SELECT * FROM review_requests WHERE status = 'PENDING' AND expires_at < ?")
        .bind(now)
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// Expire all PENDING review requests whose `expires_at` has passed.
/// Returns the number of rows affected. Idempotent.
pub async fn expire_overdue(pool: &DbPool, now: &str) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "UPDATE review_requests SET status = 'EXPIRED' WHERE status = 'PENDING' AND expires_at < ?",
    )
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(result.rows_affected())
}

/// List reviewers with at least one outstanding PENDING request, for the
/// daily review-reminder tick.
pub async fn reviewers_with_pending(pool: &DbPool) -> Result<Vec<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT reviewer_user_id FROM review_requests WHERE status = 'PENDING'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
