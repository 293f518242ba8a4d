//! ContentPipeline: drives a post from DRAFT through generation and the
//! similarity guardrail to PENDING_REVIEW (or FAILED).
//!
//! Each attempt calls the primary engine, falling back to the secondary
//! engine once a provider-quality failure (rate limit, 5xx, timeout) is
//! observed or the attempt budget is past its midpoint. A successful
//! completion that simply scores too close to recent POSTED content is
//! not a provider failure and does not trigger the fallback switch — it
//! just burns an attempt.

use uuid::Uuid;

use crate::config::{LlmConfig, PipelineConfig};
use crate::error::{ValidationError, WorkflowError};
use crate::llm::{self, GenerationParams, LlmError, LlmProvider};
use crate::similarity;
use crate::store::{embeddings, posts, revisions, DbPool};

const SYSTEM_PROMPT: &str =
    "You write short-form social posts for a single brand voice. Return only the post body, no commentary.";

/// A request to generate (or directly accept) content for a post.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub post_id: String,
    /// Prompt text describing the desired post, used as the user message.
    pub style_preset: String,
    /// When present, bypasses generation and similarity screening entirely
    /// and persists this text directly with `engineUsed = MANUAL`.
    pub manual_content: Option<String>,
    /// Forwarded to the caller's outcome for the review hand-off; the
    /// pipeline does not interpret it.
    pub scheduled_time: Option<String>,
    /// The status the post must currently hold for the initial
    /// DRAFT/PENDING_REVIEW -> GENERATING transition to succeed: `"DRAFT"`
    /// for a fresh post, `"PENDING_REVIEW"` when `ReviewCoordinator`
    /// re-enqueues generation after a regenerate action.
    pub from_status: &'static str,
}

impl GenerateRequest {
    /// A first-time generation request for a freshly created DRAFT post.
    pub fn fresh(post_id: impl Into<String>, style_preset: impl Into<String>, scheduled_time: Option<String>) -> Self {
        Self {
            post_id: post_id.into(),
            style_preset: style_preset.into(),
            manual_content: None,
            scheduled_time,
            from_status: "DRAFT",
        }
    }

    /// A regenerate request for a post currently in PENDING_REVIEW.
    pub fn regenerate(post_id: impl Into<String>, style_preset: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            style_preset: style_preset.into(),
            manual_content: None,
            scheduled_time: None,
            from_status: "PENDING_REVIEW",
        }
    }
}

/// Result of a generate attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    /// The post reached PENDING_REVIEW with this revision.
    PendingReview {
        revision_id: String,
        revision_no: i64,
        content: String,
        scheduled_time: Option<String>,
    },
    /// Generation exhausted its attempts without producing an acceptable
    /// revision; the post was moved to FAILED.
    Failed {
        error_code: String,
        message: String,
    },
}

struct LastAttempt {
    content: String,
    engine_tag: &'static str,
    embedding: Vec<f32>,
    similarity: f32,
}

/// Drives post generation: engine selection, the similarity guardrail, and
/// the DRAFT -> GENERATING -> PENDING_REVIEW/FAILED transition.
pub struct ContentPipeline {
    pool: DbPool,
    primary: Box<dyn LlmProvider>,
    fallback: Option<Box<dyn LlmProvider>>,
    embedder: Box<dyn LlmProvider>,
    config: PipelineConfig,
}

impl ContentPipeline {
    /// Build a pipeline from configuration, resolving the primary,
    /// fallback, and embedding providers via `llm::factory`.
    pub fn new(pool: DbPool, config: PipelineConfig, llm_config: &LlmConfig) -> Result<Self, WorkflowError> {
        let primary = llm::factory::create_primary(llm_config)?;
        let fallback = llm::factory::create_fallback(llm_config)?;
        let embedder = llm::factory::create_embedder(llm_config)?;
        Ok(Self {
            pool,
            primary,
            fallback,
            embedder,
            config,
        })
    }

    /// Run the generate handler for `request.post_id`.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutcome, WorkflowError> {
        posts::transition(&self.pool, &request.post_id, request.from_status, "GENERATING").await?;

        if let Some(manual_content) = &request.manual_content {
            return self.accept_manual(&request.post_id, manual_content, request.scheduled_time).await;
        }

        let max_attempts = self.config.max_attempts;
        let threshold = self.config.similarity_threshold;
        let mut last_attempt: Option<LastAttempt> = None;
        let mut previous_was_provider_failure = false;

        for attempt in 1..=max_attempts {
            let use_fallback = self.fallback.is_some()
                && (attempt as f32 > max_attempts as f32 / 2.0 || previous_was_provider_failure);
            let (engine, engine_tag): (&dyn LlmProvider, &'static str) = if use_fallback {
                (self.fallback.as_deref().unwrap(), "FALLBACK")
            } else {
                (self.primary.as_ref(), "PRIMARY")
            };

            let params = GenerationParams::default();
            let response = match engine.complete(SYSTEM_PROMPT, &request.style_preset, &params).await {
                Ok(response) => response,
                Err(LlmError::NotConfigured) => return Err(WorkflowError::LlmNotConfigured),
                Err(e) => {
                    tracing::warn!(post_id = %request.post_id, attempt, engine = engine_tag, error = %e, "generation attempt failed");
                    previous_was_provider_failure = is_provider_quality_failure(&e);
                    continue;
                }
            };

            let content = response.text.trim().to_string();
            if content.is_empty() || content.chars().count() > self.config.content_max_len {
                tracing::warn!(post_id = %request.post_id, attempt, len = content.chars().count(), "generated content failed validation");
                previous_was_provider_failure = false;
                continue;
            }

            let embedding = self.embedder.embed(&content).await?;
            let recent = embeddings::recent_posted(&self.pool, self.config.similarity_recent_n).await?;
            let recent_vectors: Vec<Vec<f32>> = recent.into_iter().map(|(_, vector)| vector).collect();
            let result = similarity::check_against_recent(&embedding, &recent_vectors);

            previous_was_provider_failure = false;

            if result.max_similarity <= threshold {
                return self
                    .persist_and_advance(
                        &request.post_id,
                        &content,
                        engine_tag,
                        &embedding,
                        Some(result.max_similarity as f64),
                        request.scheduled_time,
                    )
                    .await;
            }

            tracing::info!(post_id = %request.post_id, attempt, similarity = result.max_similarity, "candidate too similar to recent posts");
            last_attempt = Some(LastAttempt {
                content,
                engine_tag,
                embedding,
                similarity: result.max_similarity,
            });
        }

        match last_attempt {
            Some(attempt) if self.config.fail_on_similarity_exhausted => {
                let message = format!(
                    "max similarity {:.3} exceeded threshold {:.3} after {} attempts",
                    attempt.similarity, threshold, max_attempts
                );
                self.persist_revision(&request.post_id, &attempt.content, attempt.engine_tag, &attempt.embedding, Some(attempt.similarity as f64))
                    .await?;
                posts::mark_failed(&self.pool, &request.post_id, "FAILED", "SIMILARITY_EXCEEDED", &message).await?;
                Ok(GenerateOutcome::Failed {
                    error_code: "SIMILARITY_EXCEEDED".to_string(),
                    message,
                })
            }
            Some(attempt) => {
                self
                    .persist_and_advance(
                        &request.post_id,
                        &attempt.content,
                        attempt.engine_tag,
                        &attempt.embedding,
                        Some(attempt.similarity as f64),
                        request.scheduled_time,
                    )
                    .await
            }
            None => {
                let message = format!("no usable content produced after {max_attempts} attempts");
                posts::mark_failed(&self.pool, &request.post_id, "FAILED", "GENERATION_FAILED", &message).await?;
                Ok(GenerateOutcome::Failed {
                    error_code: "GENERATION_FAILED".to_string(),
                    message,
                })
            }
        }
    }

    async fn accept_manual(
        &self,
        post_id: &str,
        manual_content: &str,
        scheduled_time: Option<String>,
    ) -> Result<GenerateOutcome, WorkflowError> {
        let content = manual_content.trim().to_string();
        if content.is_empty() {
            return Err(WorkflowError::Validation(ValidationError::EmptyContent));
        }
        let len = content.chars().count();
        if len > self.config.content_max_len {
            return Err(WorkflowError::Validation(ValidationError::ContentTooLong {
                len,
                limit: self.config.content_max_len,
            }));
        }

        let revision_id = Uuid::new_v4().to_string();
        let revision_no = revisions::append(&self.pool, &revision_id, post_id, &content, "MANUAL", None).await?;
        posts::transition(&self.pool, post_id, "GENERATING", "PENDING_REVIEW").await?;

        Ok(GenerateOutcome::PendingReview {
            revision_id,
            revision_no,
            content,
            scheduled_time,
        })
    }

    async fn persist_revision(
        &self,
        post_id: &str,
        content: &str,
        engine_tag: &str,
        embedding: &[f32],
        similarity_max: Option<f64>,
    ) -> Result<(String, i64), WorkflowError> {
        let revision_id = Uuid::new_v4().to_string();
        let revision_no = revisions::append(&self.pool, &revision_id, post_id, content, engine_tag, similarity_max).await?;
        embeddings::insert(&self.pool, &revision_id, embedding).await?;
        Ok((revision_id, revision_no))
    }

    async fn persist_and_advance(
        &self,
        post_id: &str,
        content: &str,
        engine_tag: &str,
        embedding: &[f32],
        similarity_max: Option<f64>,
        scheduled_time: Option<String>,
    ) -> Result<GenerateOutcome, WorkflowError> {
        let (revision_id, revision_no) = self
            .persist_revision(post_id, content, engine_tag, embedding, similarity_max)
            .await?;
        posts::transition(&self.pool, post_id, "GENERATING", "PENDING_REVIEW").await?;

        Ok(GenerateOutcome::PendingReview {
            revision_id,
            revision_no,
            content: content.to_string(),
            scheduled_time,
        })
    }
}

fn is_provider_quality_failure(err: &LlmError) -> bool {
    match err {
        LlmError::RateLimited { .. } | LlmError::Request(_) => true,
        LlmError::Api { status, .. } => *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, TokenUsage};
    use crate::store::{init_test_db, posts::NewPost};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct StubProvider {
        name: &'static str,
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        embedding: Vec<f32>,
    }

    impl StubProvider {
        fn new(name: &'static str, responses: Vec<Result<&str, LlmError>>, embedding: Vec<f32>) -> Self {
            Self {
                name,
                responses: Mutex::new(responses.into_iter().map(|r| r.map(str::to_string)).collect()),
                embedding,
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _system: &str, _user_message: &str, _params: &GenerationParams) -> Result<LlmResponse, LlmError> {
            let mut guard = self.responses.lock().unwrap();
            match guard.pop_front() {
                Some(Ok(text)) => Ok(LlmResponse {
                    text,
                    usage: TokenUsage::default(),
                    model: self.name.to_string(),
                }),
                Some(Err(e)) => Err(e),
                None => Err(LlmError::GenerationFailed("stub exhausted".to_string())),
            }
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            Ok(())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(self.embedding.clone())
        }
    }

    async fn seed_draft(pool: &DbPool, id: &str) {
        posts::create(
            pool,
            NewPost {
                id,
                created_by: "admin",
                template_id: None,
                threads_account_id: None,
                is_ai_generated: true,
                tags: &[],
                context: None,
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
    }

    fn pipeline_with(pool: DbPool, primary: StubProvider, fallback: Option<StubProvider>, config: PipelineConfig) -> ContentPipeline {
        ContentPipeline {
            pool,
            primary: Box::new(primary),
            fallback: fallback.map(|p| Box::new(p) as Box<dyn LlmProvider>),
            embedder: Box::new(StubProvider::new("embedder", vec![], vec![1.0, 0.0])),
            config,
        }
    }

    #[tokio::test]
    async fn manual_override_persists_without_similarity_check() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        let pipeline = pipeline_with(pool.clone(), StubProvider::new("primary", vec![], vec![]), None, PipelineConfig::default());

        let outcome = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "unused".to_string(),
                manual_content: Some("hand-written post".to_string()),
                scheduled_time: Some("2026-08-01T09:00:00Z".to_string()),
                from_status: "DRAFT",
            })
            .await
            .unwrap();

        match outcome {
            GenerateOutcome::PendingReview { content, scheduled_time, .. } => {
                assert_eq!(content, "hand-written post");
                assert_eq!(scheduled_time.as_deref(), Some("2026-08-01T09:00:00Z"));
            }
            other => panic!("expected PendingReview, got {other:?}"),
        }
        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "PENDING_REVIEW");
        let revision = revisions::latest(&pool, "p1").await.unwrap().unwrap();
        assert_eq!(revision.engine_used, "MANUAL");
    }

    #[tokio::test]
    async fn generate_accepts_first_attempt_below_threshold() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        let primary = StubProvider::new("primary", vec![Ok("a fresh post")], vec![1.0, 0.0]);
        let pipeline = pipeline_with(pool.clone(), primary, None, PipelineConfig::default());

        let outcome = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "prompt".to_string(),
                manual_content: None,
                scheduled_time: None,
                from_status: "DRAFT",
            })
            .await
            .unwrap();

        assert!(matches!(outcome, GenerateOutcome::PendingReview { .. }));
        let revision = revisions::latest(&pool, "p1").await.unwrap().unwrap();
        assert_eq!(revision.engine_used, "PRIMARY");
    }

    #[tokio::test]
    async fn generate_falls_back_after_provider_failure() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        let primary = StubProvider::new(
            "primary",
            vec![Err(LlmError::RateLimited { retry_after_secs: 1 })],
            vec![1.0, 0.0],
        );
        let fallback = StubProvider::new("fallback", vec![Ok("fallback text")], vec![1.0, 0.0]);
        let pipeline = pipeline_with(pool.clone(), primary, Some(fallback), PipelineConfig::default());

        let outcome = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "prompt".to_string(),
                manual_content: None,
                scheduled_time: None,
                from_status: "DRAFT",
            })
            .await
            .unwrap();

        assert!(matches!(outcome, GenerateOutcome::PendingReview { .. }));
        let revision = revisions::latest(&pool, "p1").await.unwrap().unwrap();
        assert_eq!(revision.engine_used, "FALLBACK");
        assert_eq!(revision.content, "fallback text");
    }

    #[tokio::test]
    async fn generate_fails_on_similarity_exhausted_by_default() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        // Embedding identical to the candidate on every attempt forces a
        // 1.0 similarity match against the seeded POSTED history below.
        let similar_embedding = vec![1.0, 0.0];

        seed_draft(&pool, "history").await;
        let history_revision_id = Uuid::new_v4().to_string();
        revisions::append(&pool, &history_revision_id, "history", "older post", "PRIMARY", None)
            .await
            .unwrap();
        embeddings::insert(&pool, &history_revision_id, &similar_embedding).await.unwrap();
        sqlx::query("UPDATE posts SET status = 'POSTED', posted_at = datetime('now') WHERE id = 'history'")
            .execute(&pool)
            .await
            .unwrap();

        let responses = vec![Ok("too close v1"), Ok("too close v2"), Ok("too close v3")];
        let primary = StubProvider::new("primary", responses, similar_embedding.clone());
        let pipeline = pipeline_with(pool.clone(), primary, None, PipelineConfig::default());

        let outcome = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "prompt".to_string(),
                manual_content: None,
                scheduled_time: None,
                from_status: "DRAFT",
            })
            .await
            .unwrap();

        match outcome {
            GenerateOutcome::Failed { error_code, .. } => assert_eq!(error_code, "SIMILARITY_EXCEEDED"),
            other => panic!("expected Failed, got {other:?}"),
        }
        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "FAILED");
        assert_eq!(post.last_error_code.as_deref(), Some("SIMILARITY_EXCEEDED"));
        // The last attempt is still persisted even though the post failed.
        assert!(revisions::latest(&pool, "p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn generate_persists_best_effort_when_similarity_exhaust_is_non_fatal() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        seed_draft(&pool, "history").await;
        let similar_embedding = vec![1.0, 0.0];
        let history_revision_id = Uuid::new_v4().to_string();
        revisions::append(&pool, &history_revision_id, "history", "older post", "PRIMARY", None)
            .await
            .unwrap();
        embeddings::insert(&pool, &history_revision_id, &similar_embedding).await.unwrap();
        sqlx::query("UPDATE posts SET status = 'POSTED', posted_at = datetime('now') WHERE id = 'history'")
            .execute(&pool)
            .await
            .unwrap();

        let responses = vec![Ok("too close v1"), Ok("too close v2"), Ok("too close v3")];
        let primary = StubProvider::new("primary", responses, similar_embedding);
        let mut config = PipelineConfig::default();
        config.fail_on_similarity_exhausted = false;
        let pipeline = pipeline_with(pool.clone(), primary, None, config);

        let outcome = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "prompt".to_string(),
                manual_content: None,
                scheduled_time: None,
                from_status: "DRAFT",
            })
            .await
            .unwrap();

        assert!(matches!(outcome, GenerateOutcome::PendingReview { .. }));
        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "PENDING_REVIEW");
    }

    #[tokio::test]
    async fn generate_fails_when_every_attempt_yields_unusable_content() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        let responses = vec![Ok(""), Ok(""), Ok("")];
        let primary = StubProvider::new("primary", responses, vec![1.0, 0.0]);
        let pipeline = pipeline_with(pool.clone(), primary, None, PipelineConfig::default());

        let outcome = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "prompt".to_string(),
                manual_content: None,
                scheduled_time: None,
                from_status: "DRAFT",
            })
            .await
            .unwrap();

        match outcome {
            GenerateOutcome::Failed { error_code, .. } => assert_eq!(error_code, "GENERATION_FAILED"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(revisions::latest(&pool, "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generate_rejects_post_not_in_draft() {
        let pool = init_test_db().await.unwrap();
        seed_draft(&pool, "p1").await;
        posts::transition(&pool, "p1", "DRAFT", "GENERATING").await.unwrap();
        let pipeline = pipeline_with(pool.clone(), StubProvider::new("primary", vec![], vec![]), None, PipelineConfig::default());

        let err = pipeline
            .generate(GenerateRequest {
                post_id: "p1".to_string(),
                style_preset: "prompt".to_string(),
                manual_content: None,
                scheduled_time: None,
                from_status: "DRAFT",
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Store(_)));
    }
}
