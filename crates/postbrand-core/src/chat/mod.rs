//! Push-notification and webhook client for the chat review channel.
//!
//! Modeled on a LINE-Messaging-API-style bot: `send_review_card` pushes a
//! structured template message with three postback actions (approve,
//! regenerate, skip), `send_text` pushes plain text, and
//! `verify_webhook_signature` validates the `X-Line-Signature` header via
//! HMAC-SHA256 over the raw request body. The notifier has no awareness
//! of post/review business state — it only ships messages and parses
//! inbound events into [`InboundEvent`]s for the caller to interpret.

pub mod types;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::ChatError;

use types::{PushMessageRequest, ReviewCard, WebhookBody, WebhookEvent, WebhookMessage};

pub use types::InboundEvent;

const DEFAULT_BASE_URL: &str = "https://api.line.me/v2/bot";

type HmacSha256 = Hmac<Sha256>;

/// Push/webhook client for the chat review channel.
pub struct ChatNotifier {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl ChatNotifier {
    /// Build a notifier from configuration. Fails if no access token is
    /// configured, since every send requires bearer auth.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| ChatError::Api {
                status: 0,
                message: "chat access_token is not configured".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChatError::Network { source: e })?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token,
        })
    }

    /// Build a notifier pointed at a custom base URL, for wiremock tests.
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            access_token,
        }
    }

    /// Push a structured review card: content plus three labeled actions
    /// whose postback data carries `approve_token` / `regenerate_token` /
    /// `skip_token`.
    pub async fn send_review_card(&self, user_id: &str, card: &ReviewCard) -> Result<(), ChatError> {
        tracing::debug!(user_id, "sending review card");
        let body = PushMessageRequest {
            to: user_id.to_string(),
            messages: vec![card.to_flex_message()],
        };
        self.push(&body).await
    }

    /// Push a plain text message, used for confirmation prompts and admin
    /// ACTION_REQUIRED escalations.
    pub async fn send_text(&self, user_id: &str, text: &str) -> Result<(), ChatError> {
        tracing::debug!(user_id, chars = text.len(), "sending text message");
        let body = PushMessageRequest {
            to: user_id.to_string(),
            messages: vec![WebhookMessage::text(text)],
        };
        self.push(&body).await
    }

    async fn push(&self, body: &PushMessageRequest) -> Result<(), ChatError> {
        let response = self
            .client
            .post(format!("{}/message/push", self.base_url))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::Network { source: e })?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(ChatError::Api { status, message })
        }
    }

    /// Verify an inbound webhook's `X-Line-Signature` header: HMAC-SHA256
    /// over the raw request body, keyed by the channel signing secret,
    /// base64-encoded.
    pub fn verify_webhook_signature(
        raw_body: &[u8],
        signature_header: &str,
        signing_secret: &str,
    ) -> bool {
        let mut mac = match HmacSha256::new_from_slice(signing_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(raw_body);
        let expected = BASE64.encode(mac.finalize().into_bytes());
        constant_time_eq(expected.as_bytes(), signature_header.as_bytes())
    }

    /// Parse a webhook request body into zero or more inbound events: a
    /// postback carrying an action token, or free-typed text.
    pub fn parse_webhook(raw_body: &str) -> Result<Vec<InboundEvent>, ChatError> {
        let body: WebhookBody = serde_json::from_str(raw_body).map_err(|e| ChatError::Api {
            status: 0,
            message: format!("malformed webhook body: {e}"),
        })?;

        Ok(body.events.into_iter().filter_map(WebhookEvent::into_inbound).collect())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
