//! Storage for per-post engagement metrics synced from the social platform.

use super::DbPool;
use crate::error::StoreError;
use serde::Serialize;

/// Engagement counters for a POSTED post.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostInsights {
    pub post_id: String,
    pub views: i64,
    pub likes: i64,
    pub replies: i64,
    pub reposts: i64,
    pub last_synced_at: Option<String>,
}

impl PostInsights {
    /// `engagementRate = (likes + replies + reposts) / max(views, 1)`, the
    /// reward signal fed back into the UCB template's running mean.
    pub fn engagement_rate(&self) -> f64 {
        let numerator = (self.likes + self.replies + self.reposts) as f64;
        let denominator = self.views.max(1) as f64;
        numerator / denominator
    }
}

/// Insert or refresh a post's insights row.
pub async fn upsert(
    pool: &DbPool,
    post_id: &str,
    views: i64,
    likes: i64,
    replies: i64,
    reposts: i64,
    synced_at: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO post_insights (post_id, views, likes, replies, reposts, last_synced_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (post_id) DO UPDATE SET
           views = excluded.views, likes = excluded.likes, replies = excluded.replies,
           reposts = excluded.reposts, last_synced_at = excluded.last_synced_at",
    )
    .bind(post_id)
    .bind(views)
    .bind(likes)
    .bind(replies)
    .bind(reposts)
    .bind(synced_at)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch a post's insights.
pub async fn get(pool: &DbPool, post_id: &str) -> Result<PostInsights, StoreError> {
    sqlx::query_as("SELECT * FROM post_insights WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "post_insights",
            id: post_id.to_string(),
        })
}

/// Select POSTED posts from the last `window_days` days whose insights
/// haven't been synced in the last hour (or never synced), for InsightsSync's
/// 4-hour sweep.
pub async fn due_for_sync(
    pool: &DbPool,
    window_cutoff: &str,
    synced_cutoff: &str,
) -> Result<Vec<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT p.id FROM posts p
         LEFT JOIN post_insights pi ON pi.post_id = p.id
         WHERE p.status = 'POSTED'
           AND p.posted_at >= ?
           AND (pi.last_synced_at IS NULL OR pi.last_synced_at < ?)",
    )
    .bind(window_cutoff)
    .bind(synced_cutoff)
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, posts};

    #[tokio::test]
    async fn due_for_sync_skips_recently_synced_posts() {
        let pool = init_test_db().await.unwrap();
        posts::create(
            &pool,
            posts::NewPost {
                id: "p1",
                created_by: "admin",
                template_id: None,
                threads_account_id: None,
                is_ai_generated: false,
                tags: &[],
                context: None,
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
        sqlx::query("UPDATE posts SET status = 'POSTED', posted_at = '2026-07-29T00:00:00Z' WHERE id = 'p1'")
            .execute(&pool)
            .await
            .unwrap();

        let due = due_for_sync(&pool, "2026-07-01T00:00:00Z", "2026-07-30T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(due, vec!["p1".to_string()]);

        upsert(&pool, "p1", 10, 1, 0, 0, "2026-07-30T00:30:00Z")
            .await
            .unwrap();
        let due = due_for_sync(&pool, "2026-07-01T00:00:00Z", "2026-07-30T00:00:00Z")
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[test]
    fn engagement_rate_guards_against_zero_views() {
        let insights = PostInsights {
            post_id: "p1".to_string(),
            views: 0,
            likes: 3,
            replies: 1,
            reposts: 0,
            last_synced_at: None,
        };
        assert_eq!(insights.engagement_rate(), 4.0);
    }

    #[test]
    fn engagement_rate_divides_by_views() {
        let insights = PostInsights {
            post_id: "p1".to_string(),
            views: 100,
            likes: 8,
            replies: 1,
            reposts: 1,
            last_synced_at: None,
        };
        assert!((insights.engagement_rate() - 0.10).abs() < 1e-9);
    }
}
