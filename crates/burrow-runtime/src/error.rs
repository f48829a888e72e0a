//! Error types for the runtime crate.

use thiserror::Error;

/// Errors that can occur talking to the container engine.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The engine could not be reached.
    #[error("container engine connection failed: {0}")]
    Connect(String),

    /// An engine call failed.
    #[error("{operation} failed for container {container}: {message}")]
    Engine {
        /// The engine call that failed, such as `create_container`.
        operation: &'static str,
        /// Container name or id the call targeted.
        container: String,
        /// Engine-reported reason.
        message: String,
    },

    /// The container disappeared between lookup and use.
    #[error("container not found: {0}")]
    NotFound(String),

    /// The engine already has a container with this name.
    #[error("container name already in use: {0}")]
    NameConflict(String),
}

impl RuntimeError {
    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Engine { .. })
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::NameConflict(_) => 409,
            Self::Connect(_) | Self::Engine { .. } => 503,
        }
    }
}

/// A specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
