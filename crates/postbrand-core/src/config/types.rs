//! Configuration section structs and their serde default functions.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Store / persistence
// ---------------------------------------------------------------------------

/// Persistence layer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file (`~` expanded).
    #[serde(default = "default_store_dsn")]
    pub dsn: String,

    /// Mandatory per-query timeout, seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

pub(super) fn default_store_dsn() -> String {
    "~/.postbrand/postbrand.db".to_string()
}

pub(super) fn default_store_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// JobQueue
// ---------------------------------------------------------------------------

/// Per-queue worker pool concurrency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Concurrent workers draining the `generate` queue.
    #[serde(default = "default_generate_concurrency")]
    pub generate_concurrency: usize,

    /// Concurrent workers draining the `publish` queue.
    #[serde(default = "default_publish_concurrency")]
    pub publish_concurrency: usize,

    /// Concurrent workers draining the `tokenRefresh` queue.
    #[serde(default = "default_token_refresh_concurrency")]
    pub token_refresh_concurrency: usize,

    /// Lease duration granted to a reserved job, milliseconds.
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Retry backoff schedule in milliseconds, indexed by attempt number.
    #[serde(default = "default_backoff_schedule_ms")]
    pub backoff_schedule_ms: Vec<u64>,
}

pub(super) fn default_generate_concurrency() -> usize {
    2
}
pub(super) fn default_publish_concurrency() -> usize {
    2
}
pub(super) fn default_token_refresh_concurrency() -> usize {
    1
}
pub(super) fn default_lease_ms() -> u64 {
    60_000
}
pub(super) fn default_backoff_schedule_ms() -> Vec<u64> {
    vec![2_000, 10_000, 60_000]
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

/// A single LLM engine's credentials and model selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmEngineConfig {
    /// Provider identifier: `"openai"`, `"anthropic"`, or `"ollama"`.
    #[serde(default)]
    pub provider: String,

    /// API key, where applicable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name; providers supply a sane default when empty.
    #[serde(default)]
    pub model: String,

    /// Override base URL, e.g. for Ollama or an OpenAI-compatible proxy.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Primary/fallback LLM engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Engine attempted first in `ContentPipeline`.
    #[serde(default)]
    pub primary: LlmEngineConfig,

    /// Engine used after a provider-quality failure on the primary.
    #[serde(default)]
    pub fallback: Option<LlmEngineConfig>,

    /// Engine used for `embed()` calls when `primary` cannot embed
    /// (e.g. primary is Anthropic).
    #[serde(default)]
    pub embedding: Option<LlmEngineConfig>,

    /// Per-call timeout, seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

pub(super) fn default_llm_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// SocialClient
// ---------------------------------------------------------------------------

/// External social platform OAuth app credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SocialConfig {
    /// OAuth client id for the social platform app.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Registered OAuth redirect URI.
    #[serde(default)]
    pub redirect_uri: String,

    /// Per-call timeout, seconds.
    #[serde(default = "default_social_timeout_secs")]
    pub timeout_secs: u64,

    /// Base API URL, overridable for testing against a mock server.
    #[serde(default = "default_social_base_url")]
    pub base_url: String,
}

pub(super) fn default_social_timeout_secs() -> u64 {
    30
}
pub(super) fn default_social_base_url() -> String {
    "https://graph.threads.net".to_string()
}

// ---------------------------------------------------------------------------
// ChatNotifier
// ---------------------------------------------------------------------------

/// Chat-channel push/webhook credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Access token used to push review cards.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Shared secret used to verify inbound webhook signatures.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// The chat user id of the reviewer(s) who receive review cards and
    /// admin escalations (e.g. ACTION_REQUIRED notices).
    #[serde(default)]
    pub admin_user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// ContentPipeline / review / publish tuning
// ---------------------------------------------------------------------------

/// Tunables for the content pipeline, review flow, and publisher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Cosine similarity ceiling above which a candidate is rejected.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Number of most-recent POSTED embeddings compared against.
    #[serde(default = "default_similarity_recent_n")]
    pub similarity_recent_n: u32,

    /// Generation attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum content length, characters.
    #[serde(default = "default_content_max_len")]
    pub content_max_len: usize,

    /// Review token lifetime, hours.
    #[serde(default = "default_review_ttl_hours")]
    pub review_ttl_hours: i64,

    /// When all generation attempts exceed the similarity threshold, mark
    /// the post FAILED (`true`, the default) instead of persisting the
    /// best candidate and proceeding to review anyway (`false`).
    #[serde(default = "default_true")]
    pub fail_on_similarity_exhausted: bool,

    /// Maximum publish-step retries within a single Publisher attempt.
    #[serde(default = "default_publish_retry_attempts")]
    pub publish_retry_attempts: u32,
}

pub(super) fn default_similarity_threshold() -> f32 {
    0.86
}
pub(super) fn default_similarity_recent_n() -> u32 {
    60
}
pub(super) fn default_max_attempts() -> u32 {
    3
}
pub(super) fn default_content_max_len() -> usize {
    500
}
pub(super) fn default_review_ttl_hours() -> i64 {
    24
}
pub(super) fn default_publish_retry_attempts() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Scheduler / runtime tick cadence
// ---------------------------------------------------------------------------

/// Cadence for the periodic runtime ticks described in spec §4.K.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Expire stale reviews + purge soon-due-but-unreviewed drafts.
    #[serde(default = "default_review_sweep_interval_secs")]
    pub review_sweep_interval_secs: u64,

    /// Dispatch due APPROVED `DailyAutoSchedule`s.
    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,

    /// TokenLifecycle scan cadence.
    #[serde(default = "default_token_scan_interval_secs")]
    pub token_scan_interval_secs: u64,

    /// InsightsSync sweep cadence.
    #[serde(default = "default_insights_interval_secs")]
    pub insights_interval_secs: u64,

    /// "Ensure today's auto-schedule exists" cadence.
    #[serde(default = "default_ensure_schedule_interval_secs")]
    pub ensure_schedule_interval_secs: u64,

    /// Review-reminder cadence.
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,

    /// Graceful shutdown grace period, seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// IANA timezone used for calendar-day boundaries in the UCB
    /// scheduler (spec default: `Asia/Taipei`).
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

pub(super) fn default_review_sweep_interval_secs() -> u64 {
    300
}
pub(super) fn default_dispatch_interval_secs() -> u64 {
    300
}
pub(super) fn default_token_scan_interval_secs() -> u64 {
    6 * 3600
}
pub(super) fn default_insights_interval_secs() -> u64 {
    4 * 3600
}
pub(super) fn default_ensure_schedule_interval_secs() -> u64 {
    600
}
pub(super) fn default_reminder_interval_secs() -> u64 {
    24 * 3600
}
pub(super) fn default_shutdown_grace_secs() -> u64 {
    30
}
pub(super) fn default_timezone() -> String {
    "Asia/Taipei".to_string()
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Secrets used for at-rest encryption and admin-surface JWTs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecretsConfig {
    /// Base64-encoded 32-byte key used to AEAD-encrypt stored access tokens.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Secret used to sign/verify admin-surface bearer JWTs.
    #[serde(default)]
    pub jwt_signing_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

/// Admin HTTP surface bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Public base URL, used to build OAuth redirect URIs and links in
    /// review cards.
    #[serde(default)]
    pub base_url: Option<String>,
}

pub(super) fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
pub(super) fn default_server_port() -> u16 {
    8080
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Structured logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"postbrand_core=debug,info"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dsn: default_store_dsn(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            generate_concurrency: default_generate_concurrency(),
            publish_concurrency: default_publish_concurrency(),
            token_refresh_concurrency: default_token_refresh_concurrency(),
            lease_ms: default_lease_ms(),
            backoff_schedule_ms: default_backoff_schedule_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            similarity_recent_n: default_similarity_recent_n(),
            max_attempts: default_max_attempts(),
            content_max_len: default_content_max_len(),
            review_ttl_hours: default_review_ttl_hours(),
            fail_on_similarity_exhausted: true,
            publish_retry_attempts: default_publish_retry_attempts(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            review_sweep_interval_secs: default_review_sweep_interval_secs(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
            token_scan_interval_secs: default_token_scan_interval_secs(),
            insights_interval_secs: default_insights_interval_secs(),
            ensure_schedule_interval_secs: default_ensure_schedule_interval_secs(),
            reminder_interval_secs: default_reminder_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            timezone: default_timezone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            base_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
