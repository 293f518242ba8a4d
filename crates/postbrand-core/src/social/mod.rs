//! Client for the external social platform's two-step publish API.
//!
//! Adapted from `x_api::{auth, client}`: same bearer-auth reqwest wrapper,
//! same error-mapping-by-status-code shape, generalized from X's
//! single-call tweet endpoint to this platform's container-then-publish
//! flow and OAuth short/long-lived token exchange.

pub mod crypto;
pub mod types;

use std::time::Duration;

use crate::config::SocialConfig;
use crate::error::{SocialError, SocialErrorKind};
use crate::redact::redact_secrets;

use types::{
    ApiErrorResponse, ContainerResponse, InsightsResponse, ListMediaResponse,
    LongLivedTokenResponse, MediaInsights, MediaPage, PermalinkResponse,
    PublishResponse, PublishedMedia, ShortLivedToken,
};

/// Backoff between bounded publish retries.
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(200);

/// HTTP client for the social platform's Graph-style REST API.
pub struct SocialClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl SocialClient {
    /// Build a client from configuration.
    pub fn new(config: &SocialConfig) -> Result<Self, SocialError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SocialError::Network { source: e })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Build a client pointed at a custom base URL, for testing with wiremock.
    pub fn with_base_url(config: &SocialConfig, base_url: String) -> Result<Self, SocialError> {
        let mut client = Self::new(config)?;
        client.base_url = base_url;
        Ok(client)
    }

    /// Exchange an OAuth authorization code for a short-lived access token.
    pub async fn exchange_code(&self, code: &str) -> Result<ShortLivedToken, SocialError> {
        tracing::debug!("exchanging authorization code for short-lived token");
        let params = [
            ("client_id", self.client_id.as_str()),
            (
                "client_secret",
                self.client_secret.as_deref().unwrap_or_default(),
            ),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = self
            .client
            .post(format!("{}/oauth/access_token", self.base_url))
            .form(&params)
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        self.parse_json(response).await
    }

    /// Exchange a short-lived token for a long-lived one. Always called
    /// immediately after [`exchange_code`](Self::exchange_code).
    pub async fn exchange_for_long_lived(
        &self,
        short_token: &str,
    ) -> Result<(String, chrono::DateTime<chrono::Utc>), SocialError> {
        tracing::debug!("exchanging short-lived token for long-lived token");
        let params = [
            ("grant_type", "th_exchange_token"),
            (
                "client_secret",
                self.client_secret.as_deref().unwrap_or_default(),
            ),
            ("access_token", short_token),
        ];

        let response = self
            .client
            .get(format!("{}/access_token", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        let body: LongLivedTokenResponse = self.parse_json(response).await?;
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(body.expires_in);
        Ok((body.access_token, expires_at))
    }

    /// Refresh a long-lived token before it expires.
    pub async fn refresh(
        &self,
        token: &str,
    ) -> Result<(String, chrono::DateTime<chrono::Utc>), SocialError> {
        tracing::debug!("refreshing long-lived token");
        let params = [
            ("grant_type", "th_refresh_token"),
            ("access_token", token),
        ];

        let response = self
            .client
            .get(format!("{}/refresh_access_token", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        let body: LongLivedTokenResponse = self.parse_json(response).await?;
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(body.expires_in);
        Ok((body.access_token, expires_at))
    }

    /// Publish a text-only post: create a container, then publish it.
    /// Retries the publish step on transient errors (rate limit, network,
    /// 5xx) up to `retry_attempts` times; never retries a 4xx other than
    /// rate-limit.
    pub async fn publish(
        &self,
        account_id: &str,
        token: &str,
        text: &str,
        retry_attempts: u32,
    ) -> Result<PublishedMedia, SocialError> {
        tracing::debug!(account_id, chars = text.len(), "publishing post");

        let container = self.create_container(account_id, token, text).await?;

        let mut last_err = None;
        for attempt in 1..=retry_attempts.max(1) {
            match self.publish_container(account_id, token, &container.id).await {
                Ok(media_id) => {
                    let permalink = self.fetch_permalink(&media_id, token).await?;
                    return Ok(PublishedMedia { media_id, permalink });
                }
                Err(e) if Self::is_retryable(&e) && attempt < retry_attempts.max(1) => {
                    tracing::warn!(attempt, error = %e, "publish step failed, retrying");
                    tokio::time::sleep(PUBLISH_RETRY_DELAY * attempt).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(SocialError::PublishExhausted {
            attempts: retry_attempts.max(1),
            message: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn is_retryable(err: &SocialError) -> bool {
        matches!(
            err.kind(),
            SocialErrorKind::RateLimit | SocialErrorKind::NetworkError
        )
    }

    async fn create_container(
        &self,
        account_id: &str,
        token: &str,
        text: &str,
    ) -> Result<ContainerResponse, SocialError> {
        let response = self
            .client
            .post(format!("{}/{account_id}/threads", self.base_url))
            .bearer_auth(token)
            .form(&[("media_type", "TEXT"), ("text", text)])
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        self.parse_json(response).await
    }

    async fn publish_container(
        &self,
        account_id: &str,
        token: &str,
        creation_id: &str,
    ) -> Result<String, SocialError> {
        let response = self
            .client
            .post(format!("{}/{account_id}/threads_publish", self.base_url))
            .bearer_auth(token)
            .form(&[("creation_id", creation_id)])
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        let body: PublishResponse = self.parse_json(response).await?;
        Ok(body.id)
    }

    async fn fetch_permalink(&self, media_id: &str, token: &str) -> Result<String, SocialError> {
        let response = self
            .client
            .get(format!("{}/{media_id}", self.base_url))
            .bearer_auth(token)
            .query(&[("fields", "permalink")])
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        let body: PermalinkResponse = self.parse_json(response).await?;
        Ok(body.permalink.unwrap_or_default())
    }

    /// Fetch engagement counters for a published media item. Returns all
    /// zeros (rather than an error) when the platform reports the item is
    /// outside its metric window.
    pub async fn fetch_insights(
        &self,
        media_id: &str,
        token: &str,
    ) -> Result<MediaInsights, SocialError> {
        let response = self
            .client
            .get(format!("{}/{media_id}/insights", self.base_url))
            .bearer_auth(token)
            .query(&[("metric", "views,likes,replies,reposts")])
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        if !response.status().is_success() {
            let err = Self::map_error_response(response).await;
            if Self::is_metric_window_error(&err) {
                return Ok(MediaInsights::default());
            }
            return Err(err);
        }

        let body: InsightsResponse = response
            .json()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        let mut insights = MediaInsights::default();
        for metric in body.data {
            let value = metric.values.first().map(|v| v.value).unwrap_or(0);
            match metric.name.as_str() {
                "views" => insights.views = value,
                "likes" => insights.likes = value,
                "replies" => insights.replies = value,
                "reposts" => insights.reposts = value,
                _ => {}
            }
        }
        Ok(insights)
    }

    fn is_metric_window_error(err: &SocialError) -> bool {
        if let SocialError::Api { message, .. } = err {
            let normalized = message.to_ascii_lowercase();
            normalized.contains("window") || normalized.contains("no longer available")
        } else {
            false
        }
    }

    /// List recent media for an account, newest first. `paginate` is the
    /// cursor returned by a previous call's `next_cursor`, if continuing.
    pub async fn list_recent_media(
        &self,
        account_id: &str,
        token: &str,
        limit: u32,
        paginate: Option<&str>,
    ) -> Result<MediaPage, SocialError> {
        let limit_str = limit.to_string();
        let mut params = vec![
            ("fields", "id,permalink,timestamp"),
            ("limit", limit_str.as_str()),
        ];
        if let Some(after) = paginate {
            params.push(("after", after));
        }

        let response = self
            .client
            .get(format!("{}/{account_id}/threads", self.base_url))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| SocialError::Network { source: e })?;

        let body: ListMediaResponse = self.parse_json(response).await?;
        let next_cursor = body
            .paging
            .and_then(|p| p.cursors)
            .and_then(|c| c.after);

        Ok(MediaPage {
            data: body.data,
            next_cursor,
        })
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, SocialError> {
        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| SocialError::Network { source: e })
        } else {
            Err(Self::map_error_response(response).await)
        }
    }

    async fn map_error_response(response: reqwest::Response) -> SocialError {
        let status = response.status().as_u16();
        let raw_body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ApiErrorResponse>(&raw_body).ok();
        let message = parsed
            .and_then(|p| p.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| raw_body.clone());
        let message = redact_secrets(&message);

        let kind = match status {
            401 => SocialErrorKind::TokenExpired,
            403 => SocialErrorKind::PermissionError,
            429 => SocialErrorKind::RateLimit,
            _ => SocialErrorKind::Unknown,
        };

        SocialError::Api { kind, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> SocialConfig {
        SocialConfig {
            client_id: "cid".to_string(),
            client_secret: Some("csecret".to_string()),
            redirect_uri: "https://app.example/callback".to_string(),
            timeout_secs: 5,
            base_url,
        }
    }

    async fn client(server: &MockServer) -> SocialClient {
        SocialClient::with_base_url(&test_config(String::new()), server.uri()).unwrap()
    }

    #[tokio::test]
    async fn exchange_code_returns_short_lived_token() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "short-tok",
                "user_id": "u1"
            })))
            .mount(&server)
            .await;

        let token = client.exchange_code("auth-code").await.unwrap();
        assert_eq!(token.access_token, "short-tok");
    }

    #[tokio::test]
    async fn exchange_for_long_lived_computes_expiry() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/access_token"))
            .and(query_param("grant_type", "th_exchange_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "long-tok",
                "expires_in": 5184000
            })))
            .mount(&server)
            .await;

        let (token, expires_at) = client.exchange_for_long_lived("short-tok").await.unwrap();
        assert_eq!(token, "long-tok");
        assert!(expires_at > chrono::Utc::now());
    }

    #[tokio::test]
    async fn refresh_returns_new_token_and_expiry() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/refresh_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "refreshed-tok",
                "expires_in": 5184000
            })))
            .mount(&server)
            .await;

        let (token, _) = client.refresh("long-tok").await.unwrap();
        assert_eq!(token, "refreshed-tok");
    }

    #[tokio::test]
    async fn publish_succeeds_on_first_attempt() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("POST"))
            .and(path("/acc1/threads"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "container-1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/acc1/threads_publish"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "media-1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "permalink": "https://threads.net/p/media-1"
            })))
            .mount(&server)
            .await;

        let result = client.publish("acc1", "tok", "hello world", 3).await.unwrap();
        assert_eq!(result.media_id, "media-1");
        assert_eq!(result.permalink, "https://threads.net/p/media-1");
    }

    #[tokio::test]
    async fn publish_does_not_retry_on_permission_error() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("POST"))
            .and(path("/acc1/threads"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "container-1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/acc1/threads_publish"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"message": "insufficient permission", "code": 10}
            })))
            .mount(&server)
            .await;

        let err = client.publish("acc1", "tok", "hello", 3).await.unwrap_err();
        assert_eq!(err.kind(), SocialErrorKind::PermissionError);
    }

    #[tokio::test]
    async fn fetch_insights_returns_zeros_outside_metric_window() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/media-1/insights"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "media is outside the insights window", "code": 100}
            })))
            .mount(&server)
            .await;

        let insights = client.fetch_insights("media-1", "tok").await.unwrap();
        assert_eq!(insights, MediaInsights::default());
    }

    #[tokio::test]
    async fn fetch_insights_parses_metric_values() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/media-1/insights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"name": "views", "values": [{"value": 100}]},
                    {"name": "likes", "values": [{"value": 10}]},
                    {"name": "replies", "values": [{"value": 2}]},
                    {"name": "reposts", "values": [{"value": 1}]}
                ]
            })))
            .mount(&server)
            .await;

        let insights = client.fetch_insights("media-1", "tok").await.unwrap();
        assert_eq!(insights.views, 100);
        assert_eq!(insights.likes, 10);
        assert_eq!(insights.replies, 2);
        assert_eq!(insights.reposts, 1);
    }

    #[tokio::test]
    async fn list_recent_media_follows_pagination_cursor() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/acc1/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "m1", "permalink": "https://threads.net/p/m1"}],
                "paging": {"cursors": {"after": "cursor-2"}}
            })))
            .mount(&server)
            .await;

        let page = client
            .list_recent_media("acc1", "tok", 25, None)
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.next_cursor, Some("cursor-2".to_string()));
    }

    #[tokio::test]
    async fn error_401_maps_to_token_expired() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        Mock::given(method("GET"))
            .and(path("/refresh_access_token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "token expired"}
            })))
            .mount(&server)
            .await;

        let err = client.refresh("expired-tok").await.unwrap_err();
        assert_eq!(err.kind(), SocialErrorKind::TokenExpired);
    }
}
