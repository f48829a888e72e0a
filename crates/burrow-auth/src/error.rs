//! Authentication error types.

use burrow_store::StoreError;
use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("missing bearer token")]
    MissingToken,

    /// The presented token does not match.
    #[error("invalid token")]
    InvalidToken,

    /// A replacement token was rejected.
    #[error("invalid replacement token: {0}")]
    InvalidReplacement(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl AuthError {
    /// Returns `true` if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingToken | Self::InvalidToken => 401,
            Self::InvalidReplacement(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}
