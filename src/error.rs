//! Centralized error handling.
//!
//! Every stage of the pipeline and every mounted router reports failures as an
//! [`AppError`]. Rendering an `AppError` is the terminal error-handling stage:
//! the error is logged on the `chirp_server::error` target and turned into the
//! uniform JSON envelope
//!
//! ```json
//! { "message": "Not Found", "statusCode": 404, "errors": { "field": "detail" } }
//! ```
//!
//! `errors` is omitted when the error carries no details. Errors without an
//! explicit status code render as 500.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Per-field error details attached to an error response.
pub type ErrorDetails = BTreeMap<String, String>;

/// Application-wide error types with appropriate HTTP status codes.
#[derive(Error, Debug)]
pub enum AppError {
    /// No route answered the request.
    #[error("Not Found")]
    NotFound,

    /// State-changing request without a valid CSRF token.
    #[error("invalid csrf token")]
    InvalidCsrfToken,

    /// Malformed JSON or form body.
    #[error("{0}")]
    BodyParse(String),

    #[error("request entity too large")]
    PayloadTooLarge,

    /// Error raised by a router with an explicit status and optional details.
    #[error("{message}")]
    Http {
        status: StatusCode,
        message: String,
        errors: Option<ErrorDetails>,
    },

    #[error("{0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Error with an explicit status code and no details.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Http {
            status,
            message: message.into(),
            errors: None,
        }
    }

    /// Attach per-field details. Variants other than `Http` keep their status
    /// and message and are converted so the details can be carried.
    pub fn with_errors(self, details: ErrorDetails) -> Self {
        let status = self.status_code();
        match self {
            AppError::Http {
                status, message, ..
            } => AppError::Http {
                status,
                message,
                errors: Some(details),
            },
            other => AppError::Http {
                status,
                message: other.to_string(),
                errors: Some(details),
            },
        }
    }

    /// HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidCsrfToken => StatusCode::FORBIDDEN,
            AppError::BodyParse(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Http { status, .. } => *status,
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Details to render under `errors`, if any.
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            AppError::Http { errors, .. } => errors.as_ref(),
            _ => None,
        }
    }
}

/// Error response body shared by every failing request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorDetails>,
}

impl From<&AppError> for ErrorEnvelope {
    fn from(err: &AppError) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status_code().as_u16(),
            errors: err.details().cloned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(
            target: "chirp_server::error",
            status = status.as_u16(),
            error = %self,
            "Request failed"
        );

        (status, axum::Json(ErrorEnvelope::from(&self))).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
