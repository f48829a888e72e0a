//! Error types for tunnel orchestration.
//!
//! Every failure carries a closed [`ErrorKind`] so callers can dispatch
//! exhaustively without caring which layer raised it.

use burrow_core::TunnelId;
use burrow_runtime::RuntimeError;
use burrow_store::StoreError;
use thiserror::Error;

use crate::config_files::ConfigFileError;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Coarse classification of a [`ControlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field is missing or malformed.
    Validation,
    /// No record for the id or name.
    NotFound,
    /// Another record already uses the name.
    Conflict,
    /// The operation needed a container and none exists.
    InstanceAbsent,
    /// A container with the derived name already exists.
    AlreadyExists,
    /// Container engine, config file or database failure.
    RuntimeFailure,
}

/// Errors that can occur in tunnel orchestration.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested tunnel was not found.
    #[error("tunnel not found: {0}")]
    TunnelNotFound(TunnelId),

    /// The tunnel name is already taken.
    #[error("tunnel name already in use: {0}")]
    NameConflict(String),

    /// No container exists for the tunnel.
    #[error("no container for tunnel {0}")]
    InstanceAbsent(String),

    /// A container already exists for the tunnel.
    #[error("container already exists for tunnel {0}")]
    AlreadyExists(String),

    /// Container engine error.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Config file error.
    #[error("config file error: {0}")]
    ConfigFile(#[from] ConfigFileError),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(name) => Self::NameConflict(name),
            other => Self::Store(other),
        }
    }
}

impl ControlError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::TunnelNotFound(_) => ErrorKind::NotFound,
            Self::NameConflict(_) => ErrorKind::Conflict,
            Self::InstanceAbsent(_) => ErrorKind::InstanceAbsent,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Runtime(_) | Self::ConfigFile(_) | Self::Store(_) => ErrorKind::RuntimeFailure,
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict | ErrorKind::InstanceAbsent | ErrorKind::AlreadyExists => 409,
            ErrorKind::RuntimeFailure => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    ///
    /// Nothing in this crate retries; this is advice for callers.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Runtime(e) => e.is_retriable(),
            Self::Store(StoreError::Database(_)) => true,
            _ => false,
        }
    }
}
