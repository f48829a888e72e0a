//! Container engine abstraction for burrow.
//!
//! Tunnel agents run one per container. This crate defines the narrow
//! [`ContainerRuntime`] capability the control plane needs and provides a
//! Docker Engine implementation on top of `bollard`.
//!
//! # Example
//!
//! ```no_run
//! use burrow_runtime::{ContainerRuntime, DockerRuntime, RuntimeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = DockerRuntime::connect(&RuntimeConfig::from_env()).await?;
//!
//! if let Some(handle) = runtime.find("burrow-tunnel-web").await? {
//!     let status = runtime.state(&handle).await?;
//!     println!("{handle}: {status:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod docker;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod types;

pub use docker::DockerRuntime;
pub use error::{Result, RuntimeError};
pub use types::{ContainerHandle, ContainerSpec, ContainerStatus, LogLine, RuntimeConfig};

use async_trait::async_trait;

/// Trait for container lifecycle primitives.
///
/// Calls are not retried by callers; every failure is surfaced.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Look up a container by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    async fn find(&self, name: &str) -> Result<Option<ContainerHandle>>;

    /// Create (but do not start) a container.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NameConflict` if the name is taken.
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;

    /// Start a created or stopped container. Starting a running one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    async fn start(&self, handle: &ContainerHandle) -> Result<()>;

    /// Stop a running container. Stopping a stopped one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    async fn stop(&self, handle: &ContainerHandle) -> Result<()>;

    /// Remove a container that is not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    async fn remove(&self, handle: &ContainerHandle) -> Result<()>;

    /// Current engine status.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be inspected.
    async fn state(&self, handle: &ContainerHandle) -> Result<ContainerStatus>;

    /// Stdout lines emitted at or after `since` (epoch seconds, inclusive).
    ///
    /// # Errors
    ///
    /// Returns an error if the log stream cannot be read.
    async fn logs(&self, handle: &ContainerHandle, since: i64) -> Result<Vec<LogLine>>;
}
