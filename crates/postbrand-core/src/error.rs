//! Error types for the postbrand core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors; `anyhow` is
//! reserved for the CLI/server binaries.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Caller input failed validation. Maps to HTTP 400; never retried.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A required field was missing from the request.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// A field's value was outside its accepted bounds.
    #[error("field '{field}' out of bounds: {message}")]
    OutOfBounds {
        /// Field name.
        field: String,
        /// What was wrong.
        message: String,
    },

    /// Content exceeded the 500 character post limit.
    #[error("content length {len} exceeds limit of {limit}")]
    ContentTooLong {
        /// Actual length observed.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Content was empty where non-empty text was required.
    #[error("content is empty")]
    EmptyContent,

    /// An enum-valued field held a value outside its declared set.
    #[error("invalid enum value for '{field}': {value}")]
    InvalidEnum {
        /// Field name.
        field: String,
        /// The offending value.
        value: String,
    },
}

/// A state precondition required by an operation did not hold. Maps to
/// HTTP 409; never retried — the caller must re-read state and decide.
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    /// The entity was not in the status the operation required.
    #[error("expected status {expected}, found {actual} for {entity} {id}")]
    WrongStatus {
        /// Entity type name, e.g. "post".
        entity: &'static str,
        /// Entity id.
        id: String,
        /// Status the caller required.
        expected: String,
        /// Status actually observed.
        actual: String,
    },

    /// A one-shot token had already been consumed or had expired.
    #[error("review token is {state}")]
    StaleToken {
        /// "used" or "expired".
        state: &'static str,
    },

    /// A uniqueness invariant would be violated (e.g. a second active
    /// DailyAutoSchedule for the same calendar day).
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflicting state.
        message: String,
    },
}

/// Token invalid or expired, locally or at a downstream provider.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The bearer token presented to the admin API was invalid.
    #[error("invalid bearer token")]
    InvalidBearer,

    /// The caller's role lacked permission for this operation.
    #[error("role '{role}' is not permitted to perform this action")]
    Forbidden {
        /// The caller's role.
        role: String,
    },

    /// A downstream OAuth token expired and could not be refreshed;
    /// escalates the owning account to ACTION_REQUIRED.
    #[error("downstream token expired, action required")]
    TokenExpired,

    /// A chat webhook's signature failed verification.
    #[error("webhook signature verification failed")]
    BadSignature,
}

/// Downstream throttled the request; retried with backoff up to a cap.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Provider rejected the request with a rate-limit response.
    #[error("rate limited{}", match .retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    })]
    Throttled {
        /// Seconds to wait before retrying, if the provider specified one.
        retry_after_secs: Option<u64>,
    },
}

/// Timeout or connectivity failure; retried with backoff.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The underlying HTTP client reported a transport failure.
    #[error("network error: {source}")]
    Transport {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A mandatory operation timeout elapsed.
    #[error("operation timed out after {seconds}s")]
    Timeout {
        /// Configured timeout that elapsed.
        seconds: u64,
    },
}

/// Downstream returned a 5xx or a response that could not be parsed as
/// expected; retried once, then falls back for LLM calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned a server-side error.
    #[error("provider error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Message body or summary.
        message: String,
    },

    /// Provider's response could not be parsed into the expected shape.
    #[error("failed to parse provider response: {message}")]
    MalformedResponse {
        /// Parse failure description.
        message: String,
    },
}

/// A store-level constraint was violated; never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation {
        /// Name/description of the constraint.
        constraint: String,
    },

    /// A foreign key constraint rejected the write.
    #[error("foreign key violated: {constraint}")]
    ForeignKeyViolation {
        /// Name/description of the constraint.
        constraint: String,
    },
}

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to connect to SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type name.
        entity: &'static str,
        /// Entity id.
        id: String,
    },

    /// A state or uniqueness precondition failed at the store layer.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// A store-level integrity constraint was violated.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The operation could not be completed but may succeed on retry
    /// (connection loss, busy database).
    #[error("transient store error: {message}")]
    Transient {
        /// Description of the transient condition.
        message: String,
    },
}

/// Errors from the durable job queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Underlying store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job payload failed schema validation at handler entry.
    #[error("invalid job payload for queue '{queue}': {message}")]
    InvalidPayload {
        /// Queue name.
        queue: String,
        /// Validation failure description.
        message: String,
    },

    /// No such job exists (already completed, reclaimed by another
    /// worker, or never existed).
    #[error("job {job_id} not found or no longer reserved")]
    NotReserved {
        /// The job id.
        job_id: String,
    },
}

/// Errors from interacting with LLM providers.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// LLM API returned an error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// LLM provider rate limit hit.
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// LLM response could not be parsed.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// No LLM provider configured.
    #[error("no LLM provider configured")]
    NotConfigured,

    /// The provider does not support embeddings (e.g. Anthropic).
    #[error("provider '{provider}' does not support embeddings")]
    EmbeddingsUnsupported {
        /// Provider name.
        provider: String,
    },

    /// Content generation failed after retries.
    #[error("content generation failed: {0}")]
    GenerationFailed(String),
}

/// Classified downstream failure categories shared by SocialClient,
/// mirroring the taxonomy the caller (TokenLifecycle, Publisher) branches
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialErrorKind {
    /// Stored access token is expired or was rejected by the platform.
    TokenExpired,
    /// The account lacks permission to perform the action.
    PermissionError,
    /// Request was throttled.
    RateLimit,
    /// Connectivity or timeout failure.
    NetworkError,
    /// Anything not otherwise classified.
    Unknown,
}

/// Errors from the external social platform client.
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// Classified API failure.
    #[error("social API error ({kind:?}): {message}")]
    Api {
        /// The classified error category.
        kind: SocialErrorKind,
        /// Description or raw response body.
        message: String,
    },

    /// Underlying HTTP transport failure.
    #[error("social API network error: {source}")]
    Network {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The two-step publish flow failed after exhausting retries.
    #[error("publish failed after {attempts} attempts: {message}")]
    PublishExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last observed failure.
        message: String,
    },
}

impl SocialError {
    /// Classify this error into the shared taxonomy used by callers.
    pub fn kind(&self) -> SocialErrorKind {
        match self {
            SocialError::Api { kind, .. } => *kind,
            SocialError::Network { .. } => SocialErrorKind::NetworkError,
            SocialError::PublishExhausted { .. } => SocialErrorKind::Unknown,
        }
    }
}

/// Errors from the chat notification channel.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// HTTP request to the chat provider failed.
    #[error("chat API network error: {source}")]
    Network {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Chat API returned an error response.
    #[error("chat API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message.
        message: String,
    },

    /// Inbound webhook failed signature verification.
    #[error("invalid webhook signature")]
    BadSignature,
}

/// Errors from the orchestration layer (ContentPipeline, ReviewCoordinator,
/// Publisher, TokenLifecycle, Scheduler, UCBSelector, InsightsSync).
///
/// Workflow modules MAY call into `store`, `queue`, `llm`, `social`,
/// `chat`, `similarity`, and `ucb`. They MUST NOT depend on each other's
/// internals, only on the typed IO this enum and sibling structs define.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Underlying store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Underlying queue operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// LLM generation or embedding failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Social platform call failed.
    #[error(transparent)]
    Social(#[from] SocialError),

    /// Chat notification failed.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Caller input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A state precondition required by the operation did not hold.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// An auth/token condition blocked the operation.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No LLM provider is configured for this operation.
    #[error("LLM not configured")]
    LlmNotConfigured,

    /// No social account is configured for this operation.
    #[error("no active social account configured")]
    SocialNotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField {
            field: "llm.primary.api_key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required config field: llm.primary.api_key"
        );
    }

    #[test]
    fn config_error_file_not_found_message() {
        let err = ConfigError::FileNotFound {
            path: "/home/user/.postbrand/config.toml".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "config file not found: /home/user/.postbrand/config.toml"
        );
    }

    #[test]
    fn validation_error_content_too_long_message() {
        let err = ValidationError::ContentTooLong { len: 620, limit: 500 };
        assert_eq!(
            err.to_string(),
            "content length 620 exceeds limit of 500"
        );
    }

    #[test]
    fn precondition_error_wrong_status_message() {
        let err = PreconditionError::WrongStatus {
            entity: "post",
            id: "p1".to_string(),
            expected: "APPROVED".to_string(),
            actual: "PUBLISHING".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "expected status APPROVED, found PUBLISHING for post p1"
        );
    }

    #[test]
    fn rate_limit_error_with_retry_after() {
        let err = RateLimitError::Throttled {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 30s");
    }

    #[test]
    fn rate_limit_error_without_retry_after() {
        let err = RateLimitError::Throttled {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn llm_error_embeddings_unsupported_message() {
        let err = LlmError::EmbeddingsUnsupported {
            provider: "anthropic".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "provider 'anthropic' does not support embeddings"
        );
    }

    #[test]
    fn social_error_kind_roundtrip() {
        let err = SocialError::Api {
            kind: SocialErrorKind::TokenExpired,
            message: "expired".to_string(),
        };
        assert_eq!(err.kind(), SocialErrorKind::TokenExpired);
    }

    #[test]
    fn workflow_error_wraps_store_error() {
        let store_err = StoreError::NotFound {
            entity: "post",
            id: "p1".to_string(),
        };
        let wf: WorkflowError = store_err.into();
        assert!(matches!(wf, WorkflowError::Store(_)));
    }
}
