//! Request/response types for the external social platform's REST API.
//!
//! Field names match the wire format of a Threads-style Graph API: a
//! two-step publish flow (container, then publish), OAuth short-lived /
//! long-lived / refresh token exchange, and per-media insights.

use serde::{Deserialize, Serialize};

/// An access token returned from the initial authorization-code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortLivedToken {
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response from the short-to-long-lived token exchange, and from refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct LongLivedTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
}

/// Response from creating a publish container (step 1 of publish).
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerResponse {
    pub id: String,
}

/// Response from publishing a container (step 2 of publish).
#[derive(Debug, Clone, Deserialize)]
pub struct PublishResponse {
    pub id: String,
}

/// Permalink lookup response for a published media item.
#[derive(Debug, Clone, Deserialize)]
pub struct PermalinkResponse {
    #[serde(default)]
    pub permalink: Option<String>,
}

/// The outcome of a successful [`super::SocialClient::publish`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMedia {
    pub media_id: String,
    pub permalink: String,
}

/// Per-media engagement counters, zeroed when outside the metric window.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MediaInsights {
    pub views: i64,
    pub likes: i64,
    pub replies: i64,
    pub reposts: i64,
}

/// A single metric entry in the insights API's `data` array.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    pub values: Vec<InsightValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: i64,
}

/// Wrapper for the insights endpoint's `{"data": [...]}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightsResponse {
    #[serde(default)]
    pub data: Vec<InsightMetric>,
}

/// A single media item as returned by the recent-media listing endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaSummary {
    pub id: String,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Cursor-paginated page of recent media.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MediaPage {
    #[serde(default)]
    pub data: Vec<MediaSummary>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ListMediaResponse {
    #[serde(default)]
    pub data: Vec<MediaSummary>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Paging {
    #[serde(default)]
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

/// Error body returned by the social platform's Graph-style API.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}
