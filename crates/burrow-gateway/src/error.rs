//! API error types and responses.
//!
//! Every error body has the shape `{"error": {"code": ..., "message": ...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use burrow_auth::AuthError;
use burrow_control::{ControlError, ErrorKind};

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The tunnel has no running container.
    #[error("tunnel {0} is not running")]
    NotRunning(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::NotRunning(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NotRunning(_) => "not_running",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => Self::Unauthorized,
            AuthError::InvalidReplacement(msg) => Self::BadRequest(msg),
            AuthError::Internal(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::BadRequest(err.to_string()),
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::Conflict | ErrorKind::InstanceAbsent | ErrorKind::AlreadyExists => {
                Self::Conflict(err.to_string())
            }
            ErrorKind::RuntimeFailure => {
                tracing::error!(error = %err, "Tunnel operation failed");
                Self::Internal(err.to_string())
            }
        }
    }
}
