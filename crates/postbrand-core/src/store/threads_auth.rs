//! Storage operations for social platform OAuth tokens.
//!
//! `access_token` is stored AEAD-encrypted at rest (see [`crate::social::crypto`]);
//! this module never decrypts it — that is the caller's responsibility so the
//! store layer stays free of key material.

use super::DbPool;
use crate::error::StoreError;
use serde::Serialize;

/// A token row. `access_token` is the encrypted wire format, never plaintext.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ThreadsAuth {
    pub account_id: String,
    pub access_token: String,
    pub expires_at: String,
    pub last_refreshed_at: Option<String>,
    pub status: String,
}

/// Insert or replace the auth row for an account.
pub async fn upsert(
    pool: &DbPool,
    account_id: &str,
    encrypted_access_token: &str,
    expires_at: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO threads_auth (account_id, access_token, expires_at, last_refreshed_at, status)
         VALUES (?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), 'OK')
         ON CONFLICT (account_id) DO UPDATE SET
           access_token = excluded.access_token,
           expires_at = excluded.expires_at,
           last_refreshed_at = excluded.last_refreshed_at,
           status = 'OK'",
    )
    .bind(account_id)
    .bind(encrypted_access_token)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch the auth row for an account.
pub async fn get(pool: &DbPool, account_id: &str) -> Result<ThreadsAuth, StoreError> {
    sqlx::query_as("SELECT * FROM threads_auth WHERE account_id = ?")
        .bind(account_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?
        .ok_or_else(|| StoreError::NotFound {
            entity: "threads_auth",
            id: account_id.to_string(),
        })
}

/// Mark an account's auth ACTION_REQUIRED after a failed refresh.
pub async fn mark_action_required(pool: &DbPool, account_id: &str) -> Result<(), StoreError> {
    sqlx::query("UPDATE threads_auth SET status = 'ACTION_REQUIRED' WHERE account_id = ?")
        .bind(account_id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Select accounts due for a refresh: ACTIVE account, auth OK, expiring
/// within `within_days` days, and not refreshed within the last 24h (or
/// never refreshed). Used by TokenLifecycle's scan.
pub async fn due_for_refresh(
    pool: &DbPool,
    now: &str,
    expiry_cutoff: &str,
    refreshed_cutoff: &str,
) -> Result<Vec<ThreadsAuth>, StoreError> {
    sqlx::query_as(
        "SELECT ta.* FROM threads_auth ta
         JOIN threads_accounts acc ON acc.id = ta.account_id
         WHERE acc.status = 'ACTIVE'
           AND ta.status = 'OK'
           AND ta.expires_at <= ?
           AND ta.expires_at > ?
           AND (ta.last_refreshed_at IS NULL OR ta.last_refreshed_at < ?)",
    )
    .bind(expiry_cutoff)
    .bind(now)
    .bind(refreshed_cutoff)
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, threads_accounts};

    #[tokio::test]
    async fn upsert_then_get_roundtrip() {
        let pool = init_test_db().await.unwrap();
        threads_accounts::create(&pool, "acc1", "u1", "brand", "ext-1", true)
            .await
            .unwrap();

        upsert(&pool, "acc1", "enc-token", "2999-01-01T00:00:00Z")
            .await
            .unwrap();

        let auth = get(&pool, "acc1").await.unwrap();
        assert_eq!(auth.access_token, "enc-token");
        assert_eq!(auth.status, "OK");
    }

    #[tokio::test]
    async fn mark_action_required_updates_status() {
        let pool = init_test_db().await.unwrap();
        threads_accounts::create(&pool, "acc1", "u1", "brand", "ext-1", true)
            .await
            .unwrap();
        upsert(&pool, "acc1", "enc-token", "2999-01-01T00:00:00Z")
            .await
            .unwrap();

        mark_action_required(&pool, "acc1").await.unwrap();
        let auth = get(&pool, "acc1").await.unwrap();
        assert_eq!(auth.status, "ACTION_REQUIRED");
    }
}
