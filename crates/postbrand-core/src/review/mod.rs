//! ReviewCoordinator: issues review cards for PENDING_REVIEW posts and
//! consumes the inbound approve/regenerate/skip actions (or a free-typed
//! edit) that come back through the chat webhook.
//!
//! A `ReviewRequest` carries a single one-shot token; the three buttons on
//! its review card all carry that same token with a different `action`,
//! so approving, regenerating, or skipping each consume it exactly once
//! and the other two buttons become stale.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::chat::types::ReviewCard;
use crate::chat::{ChatNotifier, InboundEvent};
use crate::config::{ChatConfig, PipelineConfig};
use crate::error::{PreconditionError, ValidationError, WorkflowError};
use crate::queue::payloads::{GenerateJobPayload, PublishJobPayload};
use crate::queue::{self, EnqueueOptions};
use crate::store::review_requests::ReviewRequest;
use crate::store::{daily_auto_schedules, posts, revisions, review_requests, DbPool};

/// Outcome of consuming one inbound review action.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    /// The post was transitioned to APPROVED and either queued for
    /// immediate publish or left for `Scheduler` to dispatch later.
    Approved { post_id: String, publish_enqueued: bool },
    /// A new `generate` job was enqueued for the post.
    Regenerating { post_id: String },
    /// The post was transitioned to SKIPPED.
    Skipped { post_id: String },
    /// Free-typed text was captured as the active request's edited
    /// content; no state transition happened yet, a confirmation card
    /// should be sent.
    EditCaptured { post_id: String },
}

/// Issues review cards and resolves the actions taken on them.
pub struct ReviewCoordinator {
    pool: DbPool,
    chat: ChatNotifier,
    review_ttl_hours: i64,
    reviewer_user_id: String,
}

impl ReviewCoordinator {
    pub fn new(pool: DbPool, chat: ChatNotifier, pipeline_config: &PipelineConfig, chat_config: &ChatConfig) -> Result<Self, WorkflowError> {
        let reviewer_user_id = chat_config.admin_user_id.clone().ok_or_else(|| {
            WorkflowError::Validation(ValidationError::MissingField {
                field: "chat.admin_user_id".to_string(),
            })
        })?;

        Ok(Self {
            pool,
            chat,
            review_ttl_hours: pipeline_config.review_ttl_hours,
            reviewer_user_id,
        })
    }

    /// Issue a review request and dispatch its card. Called once a post
    /// reaches PENDING_REVIEW.
    pub async fn issue(&self, post_id: &str, revision_id: &str, content: &str, scheduled_time: Option<&str>) -> Result<(), WorkflowError> {
        let token = generate_token();
        let expires_at = (Utc::now() + Duration::hours(self.review_ttl_hours))
            .format("%Y-%m-%dT%H:%M:%.3fZ")
            .to_string();
        let request_id = Uuid::new_v4().to_string();

        review_requests::create(&self.pool, &request_id, post_id, revision_id, &token, &self.reviewer_user_id, &expires_at).await?;

        let card = ReviewCard {
            content: content.to_string(),
            approve_token: token.clone(),
            regenerate_token: token.clone(),
            skip_token: token,
            scheduled_for: scheduled_time.map(str::to_string),
        };
        self.chat.send_review_card(&self.reviewer_user_id, &card).await?;
        Ok(())
    }

    /// Resolve one inbound webhook event.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<ReviewOutcome, WorkflowError> {
        match event {
            InboundEvent::Postback { user_id, action, token } => self.handle_action(&user_id, &action, &token).await,
            InboundEvent::Text { user_id, text } => self.handle_free_text(&user_id, &text).await,
        }
    }

    async fn handle_action(&self, user_id: &str, action: &str, token: &str) -> Result<ReviewOutcome, WorkflowError> {
        let request = review_requests::get_by_token(&self.pool, token).await?;
        self.validate_owner(&request, user_id)?;

        let now = Utc::now().format("%Y-%m-%dT%H:%M:%.3fZ").to_string();
        review_requests::mark_used(&self.pool, token, &now).await?;

        match action {
            "approve" => self.approve(&request).await,
            "regenerate" => self.regenerate(&request).await,
            "skip" => self.skip(&request).await,
            other => Err(WorkflowError::Validation(ValidationError::InvalidEnum {
                field: "action".to_string(),
                value: other.to_string(),
            })),
        }
    }

    /// Free-typed text while a PENDING review exists for this user is
    /// captured as the request's edited content (§4.H.1); it does not
    /// consume the token or change post state.
    async fn handle_free_text(&self, user_id: &str, text: &str) -> Result<ReviewOutcome, WorkflowError> {
        let request = review_requests::active_for_reviewer(&self.pool, user_id)
            .await?
            .ok_or_else(|| WorkflowError::Precondition(PreconditionError::Conflict {
                message: format!("no pending review request for reviewer {user_id}"),
            }))?;

        review_requests::set_edited_content(&self.pool, &request.id, text).await?;
        self.chat
            .send_text(user_id, "Got it. Reply with the approve button to publish this edit.")
            .await?;

        Ok(ReviewOutcome::EditCaptured { post_id: request.post_id })
    }

    fn validate_owner(&self, request: &ReviewRequest, user_id: &str) -> Result<(), WorkflowError> {
        if request.reviewer_user_id != user_id {
            return Err(WorkflowError::Precondition(PreconditionError::Conflict {
                message: format!("token does not belong to reviewer {user_id}"),
            }));
        }
        Ok(())
    }

    async fn approve(&self, request: &ReviewRequest) -> Result<ReviewOutcome, WorkflowError> {
        if let Some(edited_content) = &request.edited_content {
            let revision_id = Uuid::new_v4().to_string();
            revisions::append(&self.pool, &revision_id, &request.post_id, edited_content, "MANUAL", None).await?;
        }

        posts::transition(&self.pool, &request.post_id, "PENDING_REVIEW", "APPROVED").await?;

        if let Some(schedule) = daily_auto_schedules::for_post(&self.pool, &request.post_id).await? {
            daily_auto_schedules::transition(&self.pool, &schedule.id, "GENERATED", "APPROVED").await?;
        }

        let post = posts::get(&self.pool, &request.post_id).await?;
        let publish_now = match &post.scheduled_for {
            Some(scheduled_for) => scheduled_for.as_str() <= Utc::now().format("%Y-%m-%dT%H:%M:%.3fZ").to_string().as_str(),
            None => true,
        };

        if publish_now {
            queue::enqueue(
                &self.pool,
                &Uuid::new_v4().to_string(),
                "publish",
                &PublishJobPayload { post_id: request.post_id.clone() },
                EnqueueOptions::default(),
            )
            .await?;
        }

        Ok(ReviewOutcome::Approved {
            post_id: request.post_id.clone(),
            publish_enqueued: publish_now,
        })
    }

    async fn regenerate(&self, request: &ReviewRequest) -> Result<ReviewOutcome, WorkflowError> {
        let latest = revisions::latest(&self.pool, &request.post_id).await?;
        let style_preset = latest.map(|r| r.content).unwrap_or_default();

        queue::enqueue(
            &self.pool,
            &Uuid::new_v4().to_string(),
            "generate",
            &GenerateJobPayload {
                post_id: request.post_id.clone(),
                style_preset,
                from_status: "PENDING_REVIEW".to_string(),
                scheduled_time: None,
            },
            EnqueueOptions::default(),
        )
        .await?;

        Ok(ReviewOutcome::Regenerating { post_id: request.post_id.clone() })
    }

    async fn skip(&self, request: &ReviewRequest) -> Result<ReviewOutcome, WorkflowError> {
        posts::transition(&self.pool, &request.post_id, "PENDING_REVIEW", "SKIPPED").await?;
        Ok(ReviewOutcome::Skipped { post_id: request.post_id.clone() })
    }
}

/// Generate a 128-bit random, URL-safe review token.
fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, posts::NewPost};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn seed_pending_review(pool: &DbPool, post_id: &str) -> String {
        posts::create(
            pool,
            NewPost {
                id: post_id,
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
        posts::transition(pool, post_id, "DRAFT", "GENERATING").await.unwrap();
        let revision_id = Uuid::new_v4().to_string();
        revisions::append(pool, &revision_id, post_id, "draft body", "PRIMARY", Some(0.1))
            .await
            .unwrap();
        posts::transition(pool, post_id, "GENERATING", "PENDING_REVIEW").await.unwrap();
        revision_id
    }

    fn coordinator(pool: DbPool, server: &MockServer) -> ReviewCoordinator {
        let chat = ChatNotifier::with_base_url("tok".to_string(), server.uri());
        let mut chat_config = ChatConfig::default();
        chat_config.admin_user_id = Some("U-admin".to_string());
        ReviewCoordinator::new(pool, chat, &PipelineConfig::default(), &chat_config).unwrap()
    }

    #[tokio::test]
    async fn issue_creates_request_and_sends_card() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);

        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();

        let reviewers = review_requests::reviewers_with_pending(&pool).await.unwrap();
        assert_eq!(reviewers, vec!["U-admin".to_string()]);
    }

    #[tokio::test]
    async fn approve_without_schedule_enqueues_publish_immediately() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);
        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();

        let request = review_requests::get_by_token(&pool, &pending_token(&pool).await)
            .await
            .unwrap();

        let outcome = coordinator
            .handle_action("U-admin", "approve", &request.token)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReviewOutcome::Approved {
                post_id: "p1".to_string(),
                publish_enqueued: true,
            }
        );
        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "APPROVED");

        let job = queue::reserve(&pool, "publish", 60_000).await.unwrap();
        assert!(job.is_some());
    }

    #[tokio::test]
    async fn regenerate_enqueues_generate_job_and_reopens_generating() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);
        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();
        let token = pending_token(&pool).await;

        let outcome = coordinator.handle_action("U-admin", "regenerate", &token).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::Regenerating { post_id: "p1".to_string() });

        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "PENDING_REVIEW");
        let job = queue::reserve(&pool, "generate", 60_000).await.unwrap().unwrap();
        let payload: GenerateJobPayload = job.payload_as().unwrap();
        assert_eq!(payload.from_status, "PENDING_REVIEW");
    }

    #[tokio::test]
    async fn skip_transitions_post_to_skipped() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);
        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();
        let token = pending_token(&pool).await;

        coordinator.handle_action("U-admin", "skip", &token).await.unwrap();
        let post = posts::get(&pool, "p1").await.unwrap();
        assert_eq!(post.status, "SKIPPED");
    }

    #[tokio::test]
    async fn replayed_token_is_rejected_as_stale() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);
        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();
        let token = pending_token(&pool).await;

        coordinator.handle_action("U-admin", "skip", &token).await.unwrap();
        let err = coordinator.handle_action("U-admin", "approve", &token).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Store(crate::error::StoreError::Precondition(PreconditionError::StaleToken { .. }))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_at_use_even_before_the_sweep_runs() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        seed_pending_review(&pool, "p1").await;
        review_requests::create(&pool, "rr1", "p1", "r1", "tok-expired", "U-admin", "2000-01-01T00:00:00Z")
            .await
            .unwrap();

        let coordinator = coordinator(pool.clone(), &server);
        let err = coordinator.handle_action("U-admin", "approve", "tok-expired").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Store(crate::error::StoreError::Precondition(PreconditionError::StaleToken { .. }))
        ));

        let request = review_requests::get_by_token(&pool, "tok-expired").await.unwrap();
        assert_eq!(request.status, "PENDING", "still left for the periodic sweep to flip to EXPIRED");
    }

    #[tokio::test]
    async fn wrong_reviewer_is_rejected() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);
        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();
        let token = pending_token(&pool).await;

        let err = coordinator.handle_action("someone-else", "approve", &token).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Precondition(PreconditionError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn free_text_is_captured_then_confirmed_as_approve_with_edit() {
        let pool = init_test_db().await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/push"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let revision_id = seed_pending_review(&pool, "p1").await;
        let coordinator = coordinator(pool.clone(), &server);
        coordinator.issue("p1", &revision_id, "draft body", None).await.unwrap();
        let token = pending_token(&pool).await;

        let outcome = coordinator
            .handle_event(InboundEvent::Text {
                user_id: "U-admin".to_string(),
                text: "use a shorter hook".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, ReviewOutcome::EditCaptured { post_id: "p1".to_string() });

        let outcome = coordinator.handle_action("U-admin", "approve", &token).await.unwrap();
        assert!(matches!(outcome, ReviewOutcome::Approved { .. }));

        let latest = revisions::latest(&pool, "p1").await.unwrap().unwrap();
        assert_eq!(latest.content, "use a shorter hook");
        assert_eq!(latest.engine_used, "MANUAL");
    }

    async fn pending_token(pool: &DbPool) -> String {
        let reviewers = review_requests::reviewers_with_pending(pool).await.unwrap();
        assert_eq!(reviewers.len(), 1);
        let row: (String,) = sqlx::query_as("SELECT token FROM review_requests WHERE status = 'PENDING' LIMIT 1")
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }
}
