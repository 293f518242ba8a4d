//! Durable, multi-queue job store backing the generate/publish/token-refresh
//! worker pools.
//!
//! Jobs live in the `jobs` table (one table, many `queue_name` values).
//! `reserve` claims the oldest `WAITING`/`DELAYED` job whose `available_at`
//! has passed by atomically flipping it to `ACTIVE` and stamping a lease;
//! a lease that elapses without `complete`/`fail` makes the job reservable
//! again, which is how a crashed worker's job gets picked up by another.

pub mod payloads;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::store::DbPool;
use serde::{de::DeserializeOwned, Serialize};

/// A reserved unit of work.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: String,
    pub queue_name: String,
    pub payload: String,
    pub available_at: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub status: String,
    pub lease_expires_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl Job {
    /// Deserialize the job's JSON payload into a typed value.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        serde_json::from_str(&self.payload).map_err(|e| QueueError::InvalidPayload {
            queue: self.queue_name.clone(),
            message: e.to_string(),
        })
    }
}

/// Options accepted by [`enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub delay_ms: i64,
    pub max_attempts: Option<i64>,
}

/// Default retry backoff schedule in milliseconds, applied by attempt index
/// (0-based) when [`fail`] re-queues a job. The queue config may override
/// this, but callers that don't carry a config use this directly.
pub const DEFAULT_BACKOFF_MS: [i64; 3] = [2000, 10000, 60000];

fn backoff_for_attempt(schedule: &[u64], attempt: usize) -> i64 {
    let idx = attempt.min(schedule.len().saturating_sub(1));
    schedule.get(idx).copied().unwrap_or(60_000) as i64
}

/// Enqueue a new job onto `queue_name`, available immediately unless a delay
/// is given.
pub async fn enqueue<T: Serialize>(
    pool: &DbPool,
    id: &str,
    queue_name: &str,
    payload: &T,
    opts: EnqueueOptions,
) -> Result<(), QueueError> {
    let payload_json = serde_json::to_string(payload).map_err(|e| QueueError::InvalidPayload {
        queue: queue_name.to_string(),
        message: e.to_string(),
    })?;

    let status = if opts.delay_ms > 0 { "DELAYED" } else { "WAITING" };

    sqlx::query(
        "INSERT INTO jobs (id, queue_name, payload, available_at, max_attempts, status)
         VALUES (?, ?, ?, datetime('now', ? || ' milliseconds'), ?, ?)",
    )
    .bind(id)
    .bind(queue_name)
    .bind(payload_json)
    .bind(opts.delay_ms)
    .bind(opts.max_attempts.unwrap_or(3))
    .bind(status)
    .execute(pool)
    .await
    .map_err(|e| crate::error::StoreError::Query { source: e })?;

    Ok(())
}

/// Atomically claim the oldest reservable job on `queue_name`: `WAITING` or
/// `DELAYED` with `available_at` in the past, or `ACTIVE` with an elapsed
/// lease (a presumed-crashed worker's job). Returns `None` if nothing is
/// ready.
pub async fn reserve(
    pool: &DbPool,
    queue_name: &str,
    lease_ms: i64,
) -> Result<Option<Job>, QueueError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| crate::error::StoreError::Query { source: e })?;

    let candidate: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM jobs
         WHERE queue_name = ?
           AND (
             (status IN ('WAITING', 'DELAYED') AND available_at <= datetime('now'))
             OR (status = 'ACTIVE' AND lease_expires_at IS NOT NULL AND lease_expires_at <= datetime('now'))
           )
         ORDER BY available_at ASC
         LIMIT 1",
    )
    .bind(queue_name)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| crate::error::StoreError::Query { source: e })?;

    let Some((job_id,)) = candidate else {
        tx.commit().await.map_err(|e| crate::error::StoreError::Query { source: e })?;
        return Ok(None);
    };

    sqlx::query(
        "UPDATE jobs SET status = 'ACTIVE', attempts = attempts + 1,
           lease_expires_at = datetime('now', ? || ' milliseconds')
         WHERE id = ?",
    )
    .bind(lease_ms)
    .bind(&job_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| crate::error::StoreError::Query { source: e })?;

    let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
        .bind(&job_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| crate::error::StoreError::Query { source: e })?;

    tx.commit().await.map_err(|e| crate::error::StoreError::Query { source: e })?;
    Ok(Some(job))
}

/// Extend a reserved job's lease, for workers performing long operations.
pub async fn extend_lease(pool: &DbPool, job_id: &str, lease_ms: i64) -> Result<(), QueueError> {
    let result = sqlx::query(
        "UPDATE jobs SET lease_expires_at = datetime('now', ? || ' milliseconds')
         WHERE id = ? AND status = 'ACTIVE'",
    )
    .bind(lease_ms)
    .bind(job_id)
    .execute(pool)
    .await
    .map_err(|e| crate::error::StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        return Err(QueueError::NotReserved {
            job_id: job_id.to_string(),
        });
    }
    Ok(())
}

/// Mark a reserved job COMPLETED.
pub async fn complete(pool: &DbPool, job_id: &str) -> Result<(), QueueError> {
    let result = sqlx::query("UPDATE jobs SET status = 'COMPLETED', lease_expires_at = NULL WHERE id = ? AND status = 'ACTIVE'")
        .bind(job_id)
        .execute(pool)
        .await
        .map_err(|e| crate::error::StoreError::Query { source: e })?;

    if result.rows_affected() == 0 {
        return Err(QueueError::NotReserved {
            job_id: job_id.to_string(),
        });
    }
    Ok(())
}

/// Report failure of a reserved job using the given backoff schedule (ms
/// per attempt). Re-queues as `DELAYED` if attempts remain under
/// `max_attempts`, otherwise leaves the job as terminal `FAILED`.
pub async fn fail(
    pool: &DbPool,
    job_id: &str,
    error: &str,
    backoff_schedule_ms: &[u64],
) -> Result<(), QueueError> {
    let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = ? AND status = 'ACTIVE'")
        .bind(job_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| crate::error::StoreError::Query { source: e })?
        .ok_or_else(|| QueueError::NotReserved {
            job_id: job_id.to_string(),
        })?;

    if job.attempts < job.max_attempts {
        let delay_ms = backoff_for_attempt(backoff_schedule_ms, (job.attempts - 1).max(0) as usize);
        sqlx::query(
            "UPDATE jobs SET status = 'DELAYED', lease_expires_at = NULL, last_error = ?,
               available_at = datetime('now', ? || ' milliseconds')
             WHERE id = ?",
        )
        .bind(error)
        .bind(delay_ms)
        .bind(job_id)
        .execute(pool)
        .await
        .map_err(|e| crate::error::StoreError::Query { source: e })?;
    } else {
        sqlx::query(
            "UPDATE jobs SET status = 'FAILED', lease_expires_at = NULL, last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(job_id)
        .execute(pool)
        .await
        .map_err(|e| crate::error::StoreError::Query { source: e })?;
    }

    Ok(())
}

/// Per-queue semaphore permits derived from [`QueueConfig`], used by the
/// worker pool to cap concurrent handler invocations per queue.
pub struct QueuePermits {
    pub generate: tokio::sync::Semaphore,
    pub publish: tokio::sync::Semaphore,
    pub token_refresh: tokio::sync::Semaphore,
}

impl QueuePermits {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            generate: tokio::sync::Semaphore::new(config.generate_concurrency),
            publish: tokio::sync::Semaphore::new(config.publish_concurrency),
            token_refresh: tokio::sync::Semaphore::new(config.token_refresh_concurrency),
        }
    }
}
