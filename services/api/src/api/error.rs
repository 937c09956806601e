//! API error types and helpers.
//!
//! # Purpose
//! Keeps error bodies uniform across endpoints and maps store, token and OCR
//! pipeline failures onto HTTP categories.
//!
//! # Key invariants
//! - `code` is a stable upper-case identifier clients can switch on.
//! - Internal and upstream failures log their cause server-side and return a
//!   generic message.
//! - Forbidden responses never reveal whether the target exists.
use crate::api::types::ErrorResponse;
use crate::ocr::{OcrError, PipelineError};
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub const FORBIDDEN_MESSAGE: &str = "You don't have permission to perform this action";
pub const DOCUMENT_EMPTY_MESSAGE: &str = "Azure returns empty document";

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use tyr_api::api::error::api_error;
///
/// let err = api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "missing");
/// assert_eq!(err.body.code, "NOT_FOUND");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Absent documents and documents owned by someone else look the same.
pub fn api_document_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "DOCUMENT_NOTFOUND", "Document not found")
}

pub fn api_user_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "USER_NOTFOUND", "User not found")
}

pub fn api_session_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "SESSION_NOTFOUND", "Session not found")
}

pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 500 from a store error.
///
/// # What it does
/// Logs the store error and returns a generic internal error response.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "api storage error");
    api_internal_message(message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

pub fn api_token_expired() -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", "Token has expired")
}

pub fn api_invalid_credentials() -> ApiError {
    api_error(
        StatusCode::UNAUTHORIZED,
        "INVALID_CREDENTIALS",
        "Email or password is incorrect",
    )
}

pub fn api_user_blocked() -> ApiError {
    api_error(
        StatusCode::UNAUTHORIZED,
        "USER_BLOCKED",
        "Your account has been blocked and may not login",
    )
}

pub fn api_incorrect_password() -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "INCORRECT_PASSWORD",
        "Incorrect old password",
    )
}

pub fn api_invalid_grant_type() -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "INVALID_GRANT_TYPE",
        "grant_type must be one of: app, portal",
    )
}

pub fn api_invalid_refresh_token() -> ApiError {
    api_error(
        StatusCode::UNAUTHORIZED,
        "INVALID_REFRESH_TOKEN",
        "Invalid refresh token",
    )
}

pub fn api_forbidden() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "FORBIDDEN", FORBIDDEN_MESSAGE)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
}

/// Map a store lookup failure, treating `NotFound` as `not_found`.
pub fn api_store_error(err: StoreError, not_found: impl FnOnce() -> ApiError) -> ApiError {
    match err {
        StoreError::NotFound(_) => not_found(),
        StoreError::Conflict(message) => api_conflict("CONFLICT", &message),
        err => api_internal("storage failure", &err),
    }
}

fn api_upstream(detail: &dyn std::fmt::Display) -> ApiError {
    tracing::warn!(error = %detail, "document analysis provider failure");
    api_error(
        StatusCode::BAD_GATEWAY,
        "UPSTREAM_ERROR",
        "Document analysis provider error",
    )
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        api_upstream(&err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Empty => {
                api_error(StatusCode::BAD_REQUEST, "DOCUMENT_EMPTY", DOCUMENT_EMPTY_MESSAGE)
            }
            PipelineError::Pending(status) => api_conflict(
                "ANALYSIS_PENDING",
                &format!("Document analysis is not finished (status: {status})"),
            ),
            PipelineError::Store(err) => api_store_error(err, api_document_not_found),
            PipelineError::Ocr(err) => err.into(),
            err @ (PipelineError::Failed(_) | PipelineError::Malformed(_)) => api_upstream(&err),
        }
    }
}
