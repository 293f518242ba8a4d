//! Wire types for the chat push/webhook API.

use serde::{Deserialize, Serialize};

/// Content and action tokens for a single review card.
#[derive(Debug, Clone)]
pub struct ReviewCard {
    pub content: String,
    pub approve_token: String,
    pub regenerate_token: String,
    pub skip_token: String,
    pub scheduled_for: Option<String>,
}

impl ReviewCard {
    /// Render this card as a template message with three postback buttons,
    /// one per action token.
    pub(super) fn to_flex_message(&self) -> WebhookMessage {
        let mut text = self.content.clone();
        if let Some(scheduled_for) = &self.scheduled_for {
            text.push_str(&format!("\n\nScheduled for: {scheduled_for}"));
        }

        WebhookMessage::Template {
            alt_text: "Review a draft post".to_string(),
            template: TemplateBody::Buttons {
                text,
                actions: vec![
                    PostbackAction::new("Approve", "approve", &self.approve_token),
                    PostbackAction::new("Regenerate", "regenerate", &self.regenerate_token),
                    PostbackAction::new("Skip", "skip", &self.skip_token),
                ],
            },
        }
    }
}

/// Body of a push-message API request.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessageRequest {
    pub to: String,
    pub messages: Vec<WebhookMessage>,
}

/// A single outbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WebhookMessage {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "template")]
    Template {
        #[serde(rename = "altText")]
        alt_text: String,
        template: TemplateBody,
    },
}

impl WebhookMessage {
    pub(super) fn text(text: &str) -> Self {
        WebhookMessage::Text {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TemplateBody {
    #[serde(rename = "buttons")]
    Buttons {
        text: String,
        actions: Vec<PostbackAction>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PostbackAction {
    #[serde(rename = "type")]
    kind: &'static str,
    label: String,
    data: String,
}

impl PostbackAction {
    fn new(label: &str, action: &str, token: &str) -> Self {
        Self {
            kind: "postback",
            label: label.to_string(),
            data: format!("action={action}&token={token}"),
        }
    }
}

/// The decoded `{"events": [...]}` envelope of an inbound webhook.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: WebhookSource,
    #[serde(default)]
    pub message: Option<InboundMessageBody>,
    #[serde(default)]
    pub postback: Option<InboundPostbackBody>,
}

impl WebhookEvent {
    pub(super) fn into_inbound(self) -> Option<InboundEvent> {
        match self.event_type.as_str() {
            "postback" => {
                let data = self.postback?.data;
                let (action, token) = parse_postback_data(&data)?;
                Some(InboundEvent::Postback {
                    user_id: self.source.user_id,
                    action,
                    token,
                })
            }
            "message" => {
                let message = self.message?;
                if message.message_type == "text" {
                    Some(InboundEvent::Text {
                        user_id: self.source.user_id,
                        text: message.text?,
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn parse_postback_data(data: &str) -> Option<(String, String)> {
    let mut action = None;
    let mut token = None;
    for pair in data.split('&') {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?;
        let value = parts.next().unwrap_or_default();
        match key {
            "action" => action = Some(value.to_string()),
            "token" => token = Some(value.to_string()),
            _ => {}
        }
    }
    Some((action?, token?))
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct WebhookSource {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct InboundMessageBody {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct InboundPostbackBody {
    pub data: String,
}

/// A single inbound webhook event, reduced to what `ReviewCoordinator`
/// needs: either a labeled action carrying its token, or free-typed text
/// (the edit-then-publish path).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Postback {
        user_id: String,
        action: String,
        token: String,
    },
    Text {
        user_id: String,
        text: String,
    },
}
