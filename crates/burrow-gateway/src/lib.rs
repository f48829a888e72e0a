//! HTTP gateway for the burrow tunnel orchestrator.
//!
//! This crate provides the public-facing API for managing tunnels. It
//! handles:
//!
//! - Bearer token authentication and rotation
//! - REST endpoints for tunnel CRUD and lifecycle actions
//! - Log and status retrieval per tunnel
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Clients                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      burrow-gateway                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Bearer    │ │   Router    │ │    Error mapping    │    │
//! │  │  Extractor  │ │  + Handlers │ │    (ApiError)       │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                     ┌────────┴────────┐
//!                     ▼                 ▼
//!              ┌───────────────┐ ┌─────────────┐
//!              │ TunnelService │ │ Token       │
//!              │ (control)     │ │ validator   │
//!              └───────────────┘ └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use burrow_auth::StoredTokenValidator;
//! use burrow_control::{ControlConfig, FsConfigFileStore, TunnelService};
//! use burrow_gateway::{create_router, GatewayConfig, GatewayState};
//! use burrow_runtime::{DockerRuntime, RuntimeConfig};
//! use burrow_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControlConfig::default();
//! let store = Arc::new(RocksStore::open("/tmp/burrow-db")?);
//! let runtime = Arc::new(DockerRuntime::connect(&RuntimeConfig::default()).await?);
//! let files = Arc::new(FsConfigFileStore::new(config.config_dir())?);
//! let validator = Arc::new(StoredTokenValidator::open(Arc::clone(&store), "s3cret")?);
//! let control = Arc::new(TunnelService::new(store, runtime, files, config));
//!
//! let state = GatewayState::new(control, validator, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::Authenticated;
pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
