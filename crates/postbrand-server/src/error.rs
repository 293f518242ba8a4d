//! API error types for the postbrand server.
//!
//! Maps the core workflow error taxonomy to HTTP status codes and JSON
//! error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use postbrand_core::error::{AuthError, PreconditionError, StoreError, ValidationError, WorkflowError};
use serde_json::json;

/// API error type for route handlers.
pub enum ApiError {
    /// A core workflow operation failed.
    Workflow(WorkflowError),
    /// Requested resource not found.
    NotFound(String),
    /// Bad request (invalid body, query parameters, etc.).
    BadRequest(String),
    /// Caller presented no or an invalid bearer token.
    Unauthorized(String),
    /// Caller's role does not permit this action.
    Forbidden(String),
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Workflow(WorkflowError::Store(err))
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Workflow(WorkflowError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Workflow(e) => workflow_status(&e),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

fn workflow_status(err: &WorkflowError) -> (StatusCode, String) {
    let message = err.to_string();
    let status = match err {
        WorkflowError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        WorkflowError::Store(StoreError::Precondition(_)) => StatusCode::CONFLICT,
        WorkflowError::Store(_) => {
            tracing::error!(error = %err, "store error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        WorkflowError::Validation(ValidationError::MissingField { .. })
        | WorkflowError::Validation(ValidationError::OutOfBounds { .. })
        | WorkflowError::Validation(ValidationError::ContentTooLong { .. })
        | WorkflowError::Validation(ValidationError::EmptyContent)
        | WorkflowError::Validation(ValidationError::InvalidEnum { .. }) => StatusCode::BAD_REQUEST,
        WorkflowError::Precondition(PreconditionError::WrongStatus { .. })
        | WorkflowError::Precondition(PreconditionError::Conflict { .. })
        | WorkflowError::Precondition(PreconditionError::StaleToken { .. }) => StatusCode::CONFLICT,
        WorkflowError::Auth(AuthError::InvalidBearer) | WorkflowError::Auth(AuthError::BadSignature) => {
            StatusCode::UNAUTHORIZED
        }
        WorkflowError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        WorkflowError::Auth(AuthError::TokenExpired) => StatusCode::CONFLICT,
        WorkflowError::LlmNotConfigured | WorkflowError::SocialNotConfigured => StatusCode::CONFLICT,
        WorkflowError::Queue(_) | WorkflowError::Llm(_) | WorkflowError::Social(_) | WorkflowError::Chat(_) => {
            tracing::error!(error = %err, "downstream workflow error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, message)
}
