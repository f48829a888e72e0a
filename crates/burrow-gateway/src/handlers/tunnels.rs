//! Tunnel management endpoints.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use burrow_auth::TokenValidator;
use burrow_control::{
    ControlError, LogLine, LogOptions, Proto, StatusInfo, TunnelId, TunnelOrchestrator,
    TunnelRequest, TunnelState, TunnelView,
};

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Response for a single tunnel.
#[derive(Debug, Serialize)]
pub struct TunnelResponse {
    /// Tunnel ID.
    pub id: TunnelId,
    /// Unique name and subdomain.
    pub name: String,
    /// Custom public hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Forwarded local address.
    pub local_addr: String,
    /// Requested public port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    /// Exposed protocol.
    pub proto: Proto,
    /// Endpoint credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Epoch seconds of the last start.
    pub start_time: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Engine container name.
    pub container_name: String,
    /// Live container state.
    pub state: TunnelState,
    /// Whether a container exists.
    pub exists: bool,
    /// Announced endpoint while running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusInfo>,
}

impl From<TunnelView> for TunnelResponse {
    fn from(view: TunnelView) -> Self {
        let tunnel = view.tunnel;
        Self {
            id: tunnel.id,
            name: tunnel.spec.name,
            hostname: tunnel.spec.hostname,
            local_addr: tunnel.spec.local_addr,
            remote_port: tunnel.spec.remote_port,
            proto: tunnel.spec.proto,
            auth: tunnel.spec.auth,
            start_time: tunnel.start_time,
            created_at: tunnel.created_at,
            updated_at: tunnel.updated_at,
            container_name: view.container_name,
            state: view.state,
            exists: view.exists,
            status: view.status,
        }
    }
}

/// Response for tunnel list.
#[derive(Debug, Serialize)]
pub struct ListTunnelsResponse {
    /// List of tunnels.
    pub tunnels: Vec<TunnelResponse>,
}

/// An action applied to an existing tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelAction {
    /// Start the existing container.
    Start,
    /// Stop the running container.
    Stop,
    /// Replace the container.
    Rebuild,
}

impl FromStr for TunnelAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "rebuild" => Ok(Self::Rebuild),
            other => Err(ApiError::BadRequest(format!(
                "unknown action {other:?}: expected start, stop or rebuild"
            ))),
        }
    }
}

/// Body of `PATCH /v1/tunnels/:id`.
///
/// With an `action` the spec fields are ignored. Without one, or with a
/// blank one, the spec fields replace the tunnel's spec.
#[derive(Debug, Deserialize)]
pub struct PatchTunnelBody {
    /// `start`, `stop` or `rebuild`.
    #[serde(default)]
    pub action: Option<String>,
    /// Replacement spec.
    #[serde(flatten)]
    pub spec: TunnelRequest,
}

impl PatchTunnelBody {
    /// The requested action, treating a blank string as none.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for an unknown action.
    pub fn action(&self) -> Result<Option<TunnelAction>, ApiError> {
        self.action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(TunnelAction::from_str)
            .transpose()
    }
}

/// Response for tunnel logs.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// Log lines since the tunnel last started.
    pub lines: Vec<LogLine>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List all tunnels.
///
/// # Errors
///
/// Returns an error if the orchestrator operation fails.
pub async fn list_tunnels<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let tunnels = state.control.list().await?;

    Ok(Json(ListTunnelsResponse {
        tunnels: tunnels.into_iter().map(TunnelResponse::from).collect(),
    }))
}

/// Create a tunnel and bring it up.
///
/// # Errors
///
/// Returns `400` for a bad request and `409` if the name is taken.
pub async fn create_tunnel<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Json(body): Json<TunnelRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let control = Arc::clone(&state.control);
    let view = detached(async move { control.create(body).await }).await?;

    Ok((StatusCode::CREATED, Json(TunnelResponse::from(view))))
}

/// Remove every tunnel.
///
/// # Errors
///
/// Returns an error if any removal fails.
pub async fn clear_tunnels<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let control = Arc::clone(&state.control);
    detached(async move { control.clear().await }).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Get a single tunnel by ID.
///
/// # Errors
///
/// Returns `404` if the tunnel is not found.
pub async fn get_tunnel<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let id = parse_tunnel_id(&id)?;
    let view = state.control.get(id).await?;

    Ok(Json(TunnelResponse::from(view)))
}

/// Apply an action to a tunnel, or replace its spec.
///
/// # Errors
///
/// Returns `404` if the tunnel is not found, `400` for an unknown action or
/// bad spec, and `409` if the container is not in the required state.
pub async fn patch_tunnel<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<PatchTunnelBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let id = parse_tunnel_id(&id)?;
    let action = body.action()?;
    let control = Arc::clone(&state.control);

    let view = detached(async move {
        match action {
            Some(TunnelAction::Start) => control.start(id).await,
            Some(TunnelAction::Stop) => control.stop(id).await,
            Some(TunnelAction::Rebuild) => control.rebuild(id).await,
            None => control.update(id, body.spec).await,
        }
    })
    .await?;

    Ok(Json(TunnelResponse::from(view)))
}

/// Delete a tunnel and its container.
///
/// # Errors
///
/// Returns `404` if the tunnel is not found.
pub async fn delete_tunnel<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let id = parse_tunnel_id(&id)?;
    let control = Arc::clone(&state.control);
    detached(async move { control.remove(id).await }).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Get agent output since the tunnel last started.
///
/// # Errors
///
/// Returns `404` if the tunnel is not found and `409` if it has no
/// container.
pub async fn get_log<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Query(options): Query<LogOptions>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let id = parse_tunnel_id(&id)?;
    let lines = state.control.log(id, options).await?;

    Ok(Json(LogsResponse { lines }))
}

/// Get the tunnel's announced public endpoint.
///
/// Fields are empty while the agent is still connecting.
///
/// # Errors
///
/// Returns `404` if the tunnel is not found and `409` if it is not running.
pub async fn get_status<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    let id = parse_tunnel_id(&id)?;
    let status = state
        .control
        .status(id)
        .await?
        .ok_or_else(|| ApiError::NotRunning(id.to_string()))?;

    Ok(Json(status))
}

/// Run a mutating orchestrator call on its own task.
///
/// When the request timeout drops the handler, the call still runs to
/// completion under its tunnel lock. Only the response is lost.
async fn detached<T, F>(call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ControlError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "Tunnel task did not complete");
            Err(ApiError::Internal("tunnel task did not complete".to_string()))
        }
    }
}

fn parse_tunnel_id(raw: &str) -> Result<TunnelId, ApiError> {
    raw.parse()
        .map_err(|e: burrow_core::IdError| ApiError::BadRequest(e.to_string()))
}
