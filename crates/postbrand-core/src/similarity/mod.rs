//! Cosine-similarity guardrail against recently published content.
//!
//! `ContentPipeline` calls [`check_against_recent`] after embedding a
//! candidate to decide whether it is too close to something already
//! posted. An empty recent set (no POSTED history yet) must never block
//! generation, so it short-circuits to a zero score rather than dividing
//! by zero or otherwise stalling the pipeline.

/// Result of comparing a candidate embedding against the recent set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityResult {
    /// Highest cosine similarity found, in `[-1.0, 1.0]` (typically `[0, 1]`
    /// for embeddings from the same model family). `0.0` when the recent
    /// set is empty.
    pub max_similarity: f32,
    /// Index into the `recent` slice passed to [`check_against_recent`]
    /// that produced `max_similarity`, or `None` if the recent set was
    /// empty.
    pub max_index: Option<usize>,
}

/// Compare `candidate` against each vector in `recent`, returning the
/// highest cosine similarity and which entry produced it. `recent` is
/// expected to already be truncated to the configured recent-N window.
pub fn check_against_recent(candidate: &[f32], recent: &[Vec<f32>]) -> SimilarityResult {
    let mut best = SimilarityResult {
        max_similarity: 0.0,
        max_index: None,
    };

    for (index, other) in recent.iter().enumerate() {
        let sim = cosine_similarity(candidate, other);
        if best.max_index.is_none() || sim > best.max_similarity {
            best = SimilarityResult {
                max_similarity: sim,
                max_index: Some(index),
            };
        }
    }

    best
}

/// Cosine similarity between two vectors. Returns `0.0` if either vector
/// has zero magnitude or the vectors differ in length (callers should
/// never compare across embedding models, but this keeps the guardrail
/// from panicking if they do).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
