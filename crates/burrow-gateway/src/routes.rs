//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::routing::{get, patch};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use burrow_auth::TokenValidator;
use burrow_control::TunnelOrchestrator;

use crate::handlers::{health, token, tunnels};
use crate::state::GatewayState;

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PATCH, Method::DELETE];

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Authenticated
/// - `GET /info` - Service name and version
/// - `PATCH /v1/token` - Rotate the API token
/// - `GET /v1/tunnels` - List tunnels
/// - `POST /v1/tunnels` - Create tunnel
/// - `DELETE /v1/tunnels` - Remove all tunnels
/// - `GET /v1/tunnels/:id` - Get tunnel
/// - `PATCH /v1/tunnels/:id` - Start, stop, rebuild, or replace spec
/// - `DELETE /v1/tunnels/:id` - Delete tunnel
/// - `GET /v1/tunnels/:id/log` - Agent output since last start
/// - `GET /v1/tunnels/:id/status` - Announced public endpoint
pub fn create_router<C, V>(state: GatewayState<C, V>) -> Router
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    // Extract config values before moving state
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    let state = Arc::new(state);

    Router::new()
        // Public
        .route("/health", get(health::health))
        // Service
        .route("/info", get(health::info))
        // Token
        .route("/v1/token", patch(token::rotate_token::<C, V>))
        // Tunnels
        .route(
            "/v1/tunnels",
            get(tunnels::list_tunnels::<C, V>)
                .post(tunnels::create_tunnel::<C, V>)
                .delete(tunnels::clear_tunnels::<C, V>),
        )
        .route(
            "/v1/tunnels/:id",
            get(tunnels::get_tunnel::<C, V>)
                .patch(tunnels::patch_tunnel::<C, V>)
                .delete(tunnels::delete_tunnel::<C, V>),
        )
        .route("/v1/tunnels/:id/log", get(tunnels::get_log::<C, V>))
        .route("/v1/tunnels/:id/status", get(tunnels::get_status::<C, V>))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
