//! Tunnel lifecycle orchestration for burrow.
//!
//! This crate keeps three things in step for every tunnel: the persisted
//! record, the generated agent config document, and the live container.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TunnelService                          │
//! │  ┌─────────────┐ ┌─────────────────┐ ┌─────────────────┐    │
//! │  │ TunnelLocks │ │ TunnelInstance  │ │ Agent config    │    │
//! │  │ (per id)    │ │ (state machine) │ │ generation      │    │
//! │  └─────────────┘ └─────────────────┘ └─────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────────┐
//!        │  Store   │   │ Runtime  │   │ Config files │
//!        │ (RocksDB)│   │ (Docker) │   │ (YAML)       │
//!        └──────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use burrow_control::{
//!     ControlConfig, FsConfigFileStore, TunnelOrchestrator, TunnelRequest, TunnelService,
//! };
//! use burrow_runtime::{DockerRuntime, RuntimeConfig};
//! use burrow_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControlConfig::from_env();
//! let store = Arc::new(RocksStore::open("/tmp/burrow-db")?);
//! let runtime = Arc::new(DockerRuntime::connect(&RuntimeConfig::from_env()).await?);
//! let files = Arc::new(FsConfigFileStore::new(config.config_dir())?);
//!
//! let service = TunnelService::new(store, runtime, files, config);
//! let view = service
//!     .create(TunnelRequest::new("web", "127.0.0.1:8080", "http"))
//!     .await?;
//!
//! println!("{} is {:?}", view.container_name, view.state);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Mutating operations hold a lock scoped to the tunnel id for their full
//! duration, so engine calls for one tunnel never interleave. Operations on
//! different tunnels do not wait on each other.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agent;
pub mod config_files;
pub mod error;
pub mod instance;
pub mod locks;
pub mod service;
pub mod status;
pub mod types;

pub use agent::{container_name_for_tunnel, AgentPlan, AgentSettings, ConfigDocument, TunnelEntry};
pub use config_files::{ConfigFileError, ConfigFileStore, FsConfigFileStore};
pub use error::{ControlError, ErrorKind, Result};
pub use instance::{TunnelInstance, TunnelState};
pub use locks::TunnelLocks;
pub use service::{TunnelOrchestrator, TunnelService};
pub use status::StatusInfo;
pub use types::{ControlConfig, LogOptions, TunnelRequest, TunnelView};

// Re-export commonly used types from dependencies for convenience
pub use burrow_core::{Proto, TunnelId};
pub use burrow_runtime::LogLine;
pub use burrow_store::{Tunnel, TunnelSpec};
