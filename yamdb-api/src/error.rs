//! Error types for yamdb-api
//!
//! Every failure a handler can produce maps onto one client visible status:
//! 400 for input problems, 401/403 for authentication and permissions, 404
//! for missing resources and 500 for store or mail failures.

use std::collections::BTreeMap;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::mail::MailError;

/// Key used for errors that belong to the whole object rather than one field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Per-field error messages, serialized as `{"field": ["message", ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single error on one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Add `message` unless the field already carries an error
    pub fn add_once(&mut self, field: &str, message: impl Into<String>) {
        if !self.0.contains_key(field) {
            self.add(field, message);
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when empty, else the accumulated errors as a 400
    pub fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field or object level validation failure (400)
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    /// Invalid request reported as `{"detail": ...}` (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No credentials on a request that needs them (401)
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    /// Bearer token present but unusable (401)
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Authenticated but not allowed (403)
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    /// Resource not found (404)
    #[error("Not found.")]
    NotFound,

    /// Page number past the end or not a number (404)
    #[error("Invalid page.")]
    InvalidPage,

    /// Confirmation email could not be delivered (500)
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Store failure (500)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Object level validation failure
    pub fn non_field(message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(NON_FIELD_ERRORS, message))
    }

    /// Validation failure on one field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if yamdb_common::error::is_unique_violation(&err) {
            let message = err
                .as_database_error()
                .map(|db_err| db_err.message().to_string())
                .unwrap_or_else(|| err.to_string());
            ApiError::BadRequest(message)
        } else {
            ApiError::Database(err)
        }
    }
}

impl From<yamdb_common::Error> for ApiError {
    fn from(err: yamdb_common::Error) -> Self {
        use yamdb_common::Error;

        match err {
            Error::Database(e) => ApiError::from(e),
            Error::NotFound(_) => ApiError::NotFound,
            Error::Conflict(msg) | Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, json!(errors.0)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "detail": msg })),
            ApiError::NotAuthenticated => {
                let body = Json(json!({
                    "detail": "Authentication credentials were not provided."
                }));
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer realm=\"api\"")],
                    body,
                )
                    .into_response();
            }
            ApiError::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "Rejected bearer token");
                let body = Json(json!({
                    "detail": "Given token not valid for any token type",
                    "code": "token_not_valid",
                }));
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer realm=\"api\"")],
                    body,
                )
                    .into_response();
            }
            ApiError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                json!({ "detail": "You do not have permission to perform this action." }),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "detail": "Not found." })),
            ApiError::InvalidPage => {
                (StatusCode::NOT_FOUND, json!({ "detail": "Invalid page." }))
            }
            ApiError::Mail(err) => {
                error!("Mail delivery failed: {}", err);
                server_error()
            }
            ApiError::Database(err) => {
                error!("Database error: {}", err);
                server_error()
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                server_error()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn server_error() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "detail": "A server error occurred." }),
    )
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
