//! Storage operations for social platform accounts.

use super::DbPool;
use crate::error::StoreError;
use serde::Serialize;

/// A social platform account row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ThreadsAccount {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub external_account_id: String,
    pub status: String,
    pub is_default: bool,
}

/// Insert a new account.
pub async fn create(
    pool: &DbPool,
    id: &str,
    user_id: &str,
    username: &str,
    external_account_id: &str,
    is_default: bool,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO threads_accounts (id, user_id, username, external_account_id, status, is_default)
         VALUES (?, ?, ?, ?, 'ACTIVE', ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(username)
    .bind(external_account_id)
    .bind(is_default)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch an account by id.
pub async fn get(pool: &DbPool, id: &str) -> Result<ThreadsAccount, StoreError> {
    sqlx::query_as("SELECT * FROM threads_accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "threads_account",
            id: id.to_string(),
        })
}

/// Fetch the default ACTIVE account, used by Publisher when a post has no
/// explicit `threadsAccountId`.
pub async fn get_default_active(pool: &DbPool) -> Result<ThreadsAccount, StoreError> {
    sqlx::query_as(
        "SELECT * FROM threads_accounts WHERE is_default = 1 AND status = 'ACTIVE' LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?
    .ok_or_else(|| StoreError::NotFound {
        entity: "threads_account",
        id: "default".to_string(),
    })
}
