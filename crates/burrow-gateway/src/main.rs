//! Burrow - tunnel orchestrator HTTP service
//!
//! Opens the record store, connects to the container engine and serves the
//! tunnel API until interrupted.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to run against an in-memory container
//! runtime instead of a Docker engine. Containers then exist only for the
//! life of the process.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burrow_auth::StoredTokenValidator;
use burrow_control::{ControlConfig, FsConfigFileStore, TunnelService};
use burrow_gateway::{create_router, GatewayConfig, GatewayState};
#[cfg(feature = "dev-mode")]
use burrow_runtime::mock::MockRuntime;
#[cfg(not(feature = "dev-mode"))]
use burrow_runtime::{DockerRuntime, RuntimeConfig};
use burrow_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,burrow=debug,burrow_gateway=debug,burrow_control=debug,burrow_runtime=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting burrow");

    // Load configuration from environment
    let gateway_config = GatewayConfig::from_env();
    let control_config = ControlConfig::from_env();
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/burrow".into());
    let api_token = std::env::var("API_TOKEN").map_err(|_| "API_TOKEN must be set")?;
    if api_token.trim().is_empty() {
        return Err("API_TOKEN must not be empty".into());
    }

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %data_dir,
        image = %control_config.image,
        server_addr = %control_config.agent.server_addr,
        config_dir = %control_config.config_dir().display(),
        "Configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&data_dir)?);

    let files = Arc::new(FsConfigFileStore::new(control_config.config_dir())?);

    #[cfg(feature = "dev-mode")]
    let runtime = {
        tracing::warn!("DEV MODE ENABLED - using in-memory container runtime");
        Arc::new(MockRuntime::new())
    };

    #[cfg(not(feature = "dev-mode"))]
    let runtime = Arc::new(DockerRuntime::connect(&RuntimeConfig::from_env()).await?);

    // The configured token only seeds the store; a rotated token wins.
    let validator = Arc::new(StoredTokenValidator::open(Arc::clone(&store), &api_token)?);
    let control = Arc::new(TunnelService::new(store, runtime, files, control_config));

    let listen_addr = gateway_config.listen_addr.clone();
    let state = GatewayState::new(control, validator, gateway_config);
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
