//! Health and service info endpoints.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::auth::Authenticated;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Service info response.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Service name.
    pub name: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Health check handler.
///
/// This endpoint is public and does not require authentication.
///
/// # Example
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health() -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    };

    (StatusCode::OK, Json(response))
}

/// Service name and version. Requires the bearer token.
pub async fn info(_auth: Authenticated) -> impl IntoResponse {
    Json(InfoResponse {
        name: "burrow",
        version: env!("CARGO_PKG_VERSION"),
    })
}
