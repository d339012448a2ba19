//! Error handling module for the Aliment backend.
//!
//! Every failure a handler can report is one variant of [`AppError`]. Each
//! variant maps to exactly one HTTP status and renders as the issue envelope
//! `{ "issue": [ { "error": "..." } ] }` (or `warning` for lookups that miss).

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::TokenError;
use crate::db::StoreError;

/// Message returned for both unknown users and wrong passwords.
pub const WRONG_PASSWORD: &str = "Wrong password";

/// Fallback message when a failure carries no text of its own.
pub const UNEXPECTED_ERROR: &str = "Unexpected error";

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Missing or mismatched request fields
    Validation(String),
    /// Body could not be parsed
    BadRequest(String),
    /// Addressed record does not exist
    NotFound(String),
    /// Record vanished before a write could be applied to it
    NoLongerExists(String),
    /// Business key already taken
    Conflict(String),
    /// Login failed; deliberately does not say why
    WrongCredentials,
    /// Missing or invalid bearer token on a protected route
    Unauthorized(String),
    /// Record store failure
    Store(String),
    /// Anything else
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoLongerExists(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::WrongCredentials => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        let message = match self {
            AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::NoLongerExists(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg)
            | AppError::Store(msg)
            | AppError::Internal(msg) => msg.as_str(),
            AppError::WrongCredentials => WRONG_PASSWORD,
        };
        if message.is_empty() {
            UNEXPECTED_ERROR.to_string()
        } else {
            message.to_string()
        }
    }

    /// The issue entry this error renders as.
    pub fn issue(&self) -> Issue {
        match self {
            AppError::NotFound(_) => Issue::Warning(self.message()),
            _ => Issue::Error(self.message()),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Store error: {:?}", err);
        AppError::Store(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection);
        AppError::BadRequest(rejection.body_text())
    }
}

/// One entry of the issue envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Issue {
    Error(String),
    Warning(String),
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueBody {
    pub issue: Vec<Issue>,
}

impl IssueBody {
    pub fn single(issue: Issue) -> Self {
        Self { issue: vec![issue] }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(%status, "Request failed: {}", self.message());
        }
        (status, Json(IssueBody::single(self.issue()))).into_response()
    }
}

/// Response for a handler that panicked. The panic text stays in the log.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);
    AppError::Internal(UNEXPECTED_ERROR.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NoLongerExists("x".into()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            AppError::WrongCredentials.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Store("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_issue_shape() {
        let body = IssueBody::single(AppError::NotFound("Aliment not found".into()).issue());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "issue": [{ "warning": "Aliment not found" }] })
        );

        let body = IssueBody::single(AppError::WrongCredentials.issue());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "issue": [{ "error": "Wrong password" }] })
        );
    }

    #[test]
    fn test_panic_response_is_generic_500() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_message_falls_back() {
        assert_eq!(AppError::Internal(String::new()).message(), UNEXPECTED_ERROR);
    }
}
