//! Token rotation endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use burrow_auth::TokenValidator;
use burrow_control::TunnelOrchestrator;

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Request to replace the API token.
#[derive(Debug, Deserialize)]
pub struct RotateTokenBody {
    /// The token currently in use.
    pub old_token: String,
    /// The token to use from now on.
    pub new_token: String,
}

/// Rotate the API bearer token.
///
/// The old token stops working as soon as this returns.
///
/// # Errors
///
/// Returns `401` if `old_token` is wrong and `400` if `new_token` is empty.
pub async fn rotate_token<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Json(body): Json<RotateTokenBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    state
        .validator
        .rotate(&body.old_token, &body.new_token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
