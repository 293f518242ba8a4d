//! Storage operations for posts.
//!
//! Status transitions use the `UPDATE ... WHERE status = ?` conditional
//! pattern so two concurrent workers racing the same transition can tell,
//! from `rows_affected()`, which one actually won.

use super::DbPool;
use crate::error::{PreconditionError, StoreError};
use serde::Serialize;

/// A post row as read from the store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub status: String,
    pub created_by: String,
    pub template_id: Option<String>,
    pub threads_account_id: Option<String>,
    pub posted_at: Option<String>,
    pub post_url: Option<String>,
    pub media_id: Option<String>,
    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
    pub is_ai_generated: bool,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub context: Option<String>,
    pub scheduled_for: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating a new post.
pub struct NewPost<'a> {
    pub id: &'a str,
    pub created_by: &'a str,
    pub template_id: Option<&'a str>,
    pub threads_account_id: Option<&'a str>,
    pub is_ai_generated: bool,
    pub tags: &'a [String],
    pub context: Option<&'a str>,
    pub scheduled_for: Option<&'a str>,
}

/// Create a new post in DRAFT status.
pub async fn create(pool: &DbPool, new: NewPost<'_>) -> Result<(), StoreError> {
    let tags_json = serde_json::to_string(new.tags).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        "INSERT INTO posts (id, status, created_by, template_id, threads_account_id, is_ai_generated, tags, context, scheduled_for)
         VALUES (?, 'DRAFT', ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.id)
    .bind(new.created_by)
    .bind(new.template_id)
    .bind(new.threads_account_id)
    .bind(new.is_ai_generated)
    .bind(tags_json)
    .bind(new.context)
    .bind(new.scheduled_for)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    Ok(())
}

/// Fetch a post by id.
pub async fn get(pool: &DbPool, id: &str) -> Result<Post, StoreError> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "post",
            id: id.to_string(),
        })
}

/// List posts, optionally filtered by status, ordered by created_at then id,
/// most recent first, paginated.
pub async fn list(
    pool: &DbPool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, StoreError> {
    let rows = match status {
        Some(s) => {
            sqlx::query_as(
                "SELECT * FROM posts WHERE status = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(s)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as("SELECT * FROM posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
    }
    .map_err(|e| StoreError::Query { source: e })?;

    Ok(rows)
}

/// Atomically transition a post from `expected` to `next`, returning
/// `PreconditionError::WrongStatus` if the post was not in `expected`.
pub async fn transition(
    pool: &DbPool,
    id: &str,
    expected: &str,
    next: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE posts SET status = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ? AND status = ?",
    )
    .bind(next)
    .bind(id)
    .bind(expected)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        let actual = get(pool, id).await?.status;
        return Err(StoreError::Precondition(PreconditionError::WrongStatus {
            entity: "post",
            id: id.to_string(),
            expected: expected.to_string(),
            actual,
        }));
    }

    Ok(())
}

/// Claim a post for a publish attempt: APPROVED (first attempt) or FAILED
/// (a retried attempt after a transient failure) both move to PUBLISHING.
/// Any other status (already PUBLISHING, POSTED, ACTION_REQUIRED, ...)
/// means a racing or stale job and is reported as a precondition failure.
pub async fn claim_for_publishing(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE posts SET status = 'PUBLISHING', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ? AND status IN ('APPROVED', 'FAILED')",
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        let actual = get(pool, id).await?.status;
        return Err(StoreError::Precondition(PreconditionError::WrongStatus {
            entity: "post",
            id: id.to_string(),
            expected: "APPROVED or FAILED".to_string(),
            actual,
        }));
    }

    Ok(())
}

/// Unconditionally set status plus the given transition's side data, used
/// by terminal transitions that don't need an optimistic guard repeated at
/// this layer (the caller already holds the transition lock).
pub async fn mark_failed(
    pool: &DbPool,
    id: &str,
    next_status: &str,
    error_code: &str,
    error_message: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE posts SET status = ?, last_error_code = ?, last_error_message = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
    )
    .bind(next_status)
    .bind(error_code)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    Ok(())
}

/// Mark a post POSTED, recording its URL/media id and posted timestamp.
pub async fn mark_posted(
    pool: &DbPool,
    id: &str,
    post_url: &str,
    media_id: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE posts SET status = 'POSTED', post_url = ?, media_id = ?, posted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ? AND status = 'PUBLISHING'",
    )
    .bind(post_url)
    .bind(media_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        let actual = get(pool, id).await?.status;
        return Err(StoreError::Precondition(PreconditionError::WrongStatus {
            entity: "post",
            id: id.to_string(),
            expected: "PUBLISHING".to_string(),
            actual,
        }));
    }

    Ok(())
}

/// Count posts grouped by status, for the admin API's statistics views.
pub async fn count_by_status(pool: &DbPool) -> Result<Vec<(String, i64)>, StoreError> {
    sqlx::query_as("SELECT status, COUNT(*) FROM posts GROUP BY status")
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })
}

/// Delete a post and its dependent rows (administrative purge only).
pub async fn delete(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
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

    fn new_post<'a>(id: &'a str) -> NewPost<'a> {
        NewPost {
            id,
            created_by: "admin",
            template_id: None,
            threads_account_id: None,
            is_ai_generated: true,
            tags: &[],
            context: None,
            scheduled_for: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();

        let post = get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "DRAFT");
        assert_eq!(post.created_by, "admin");
        assert!(post.tags.is_empty());
    }

    #[tokio::test]
    async fn transition_succeeds_when_status_matches() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();

        transition(&pool, "p1", "DRAFT", "GENERATING").await.unwrap();
        let post = get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "GENERATING");
    }

    #[tokio::test]
    async fn transition_fails_when_status_mismatches() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();
        transition(&pool, "p1", "DRAFT", "GENERATING").await.unwrap();

        let err = transition(&pool, "p1", "DRAFT", "GENERATING")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Precondition(PreconditionError::WrongStatus { .. })
        ));
    }

    #[tokio::test]
    async fn claim_for_publishing_accepts_approved_and_failed() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();
        transition(&pool, "p1", "DRAFT", "APPROVED").await.unwrap();

        claim_for_publishing(&pool, "p1").await.unwrap();
        assert_eq!(get(&pool, "p1").await.unwrap().status, "PUBLISHING");

        mark_failed(&pool, "p1", "FAILED", "PUBLISH_FAILED", "boom").await.unwrap();
        claim_for_publishing(&pool, "p1").await.unwrap();
        assert_eq!(get(&pool, "p1").await.unwrap().status, "PUBLISHING");
    }

    #[tokio::test]
    async fn claim_for_publishing_rejects_other_statuses() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();

        let err = claim_for_publishing(&pool, "p1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Precondition(PreconditionError::WrongStatus { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_transition_only_one_wins() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();
        transition(&pool, "p1", "DRAFT", "APPROVED").await.unwrap();

        let (a, b) = tokio::join!(
            transition(&pool, "p1", "APPROVED", "PUBLISHING"),
            transition(&pool, "p1", "APPROVED", "PUBLISHING"),
        );
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|&&x| x).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn mark_posted_requires_publishing_status() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();

        let err = mark_posted(&pool, "p1", "https://example.com/p1", "m1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Precondition(PreconditionError::WrongStatus { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_orders_desc() {
        let pool = init_test_db().await.unwrap();
        create(&pool, new_post("p1")).await.unwrap();
        create(&pool, new_post("p2")).await.unwrap();
        transition(&pool, "p2", "DRAFT", "GENERATING").await.unwrap();

        let drafts = list(&pool, Some("DRAFT"), 10, 0).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, "p1");
    }
}
