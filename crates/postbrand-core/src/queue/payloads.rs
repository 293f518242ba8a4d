//! Typed job payloads shared between producers and the workers that
//! reserve and execute them. Keeping these in one place lets
//! `ContentPipeline`, `ReviewCoordinator`, `Publisher`, `TokenLifecycle`,
//! and `UCBSelector` enqueue each other's work without depending on one
//! another's internals.

use serde::{Deserialize, Serialize};

/// Payload for the `generate` queue: run `ContentPipeline::generate` for
/// `post_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateJobPayload {
    pub post_id: String,
    pub style_preset: String,
    /// `"DRAFT"` for a fresh post, `"PENDING_REVIEW"` for a regenerate.
    pub from_status: String,
    pub scheduled_time: Option<String>,
}

/// Payload for the `publish` queue: run `Publisher::publish` for `post_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishJobPayload {
    pub post_id: String,
}

/// Payload for the `tokenRefresh` queue: run `TokenLifecycle::refresh` for
/// `account_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRefreshJobPayload {
    pub account_id: String,
}
