//! Storage operations for embeddings.
//!
//! Vectors are stored as little-endian `f32` blobs rather than JSON text,
//! keeping rows compact for the `SimilarityChecker`'s recent-N scan.

use super::DbPool;
use crate::error::StoreError;

/// Serialize a vector of `f32` into a little-endian byte blob.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize a little-endian byte blob back into a vector of `f32`.
pub fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Persist the embedding for a revision.
pub async fn insert(pool: &DbPool, revision_id: &str, vector: &[f32]) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO embeddings (revision_id, vector) VALUES (?, ?)")
        .bind(revision_id)
        .bind(encode_vector(vector))
        .execute(pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
    Ok(())
}

/// Fetch the embeddings of the `recent_n` most recently POSTED posts,
/// ordered by `posted_at` descending, for `SimilarityChecker`.
pub async fn recent_posted(
    pool: &DbPool,
    recent_n: u32,
) -> Result<Vec<(String, Vec<f32>)>, StoreError> {
    let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
        "SELECT p.id, e.vector
         FROM embeddings e
         JOIN revisions r ON r.id = e.revision_id
         JOIN posts p ON p.id = r.post_id
         WHERE p.status = 'POSTED'
         ORDER BY p.posted_at DESC
         LIMIT ?",
    )
    .bind(recent_n)
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Query { source: e })?;

    Ok(rows
        .into_iter()
        .map(|(post_id, blob)| (post_id, decode_vector(&blob)))
        .collect())
}
