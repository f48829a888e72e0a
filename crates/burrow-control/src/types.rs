//! Request and response types for tunnel operations.

use std::path::PathBuf;

use burrow_core::Proto;
use burrow_store::{Tunnel, TunnelSpec};
use serde::{Deserialize, Serialize};

use crate::agent::AgentSettings;
use crate::error::{ControlError, Result};
use crate::instance::TunnelState;
use crate::status::StatusInfo;

/// Longest accepted tunnel name, the DNS label limit.
pub const MAX_NAME_LEN: usize = 63;

/// Request to create or replace a tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRequest {
    /// Unique tunnel name, used as the subdomain.
    #[serde(default)]
    pub name: String,
    /// Custom public hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Local address to forward to.
    #[serde(default)]
    pub local_addr: String,
    /// Requested public port, TCP only.
    #[serde(default)]
    pub remote_port: Option<u16>,
    /// `http`, `https` or `tcp`.
    #[serde(default)]
    pub proto: String,
    /// Credentials gating the public endpoint.
    #[serde(default)]
    pub auth: Option<String>,
}

impl TunnelRequest {
    /// Create a request with only the required fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        local_addr: impl Into<String>,
        proto: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_addr: local_addr.into(),
            proto: proto.into(),
            ..Self::default()
        }
    }

    /// Check required fields and convert to a storable spec.
    ///
    /// Blank optional fields are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` describing the first bad field.
    pub fn validate(&self) -> Result<TunnelSpec> {
        let name = self.name.trim();
        validate_name(name)?;

        let local_addr = self.local_addr.trim();
        if local_addr.is_empty() {
            return Err(ControlError::Validation("local_addr is required".into()));
        }

        if self.proto.trim().is_empty() {
            return Err(ControlError::Validation("proto is required".into()));
        }
        let proto: Proto = self
            .proto
            .parse()
            .map_err(|e: burrow_core::ProtoError| ControlError::Validation(e.to_string()))?;

        Ok(TunnelSpec {
            name: name.to_string(),
            hostname: non_blank(self.hostname.as_deref()),
            local_addr: local_addr.to_string(),
            remote_port: self.remote_port,
            proto,
            auth: non_blank(self.auth.as_deref()),
        })
    }
}

impl From<&TunnelSpec> for TunnelRequest {
    fn from(spec: &TunnelSpec) -> Self {
        Self {
            name: spec.name.clone(),
            hostname: spec.hostname.clone(),
            local_addr: spec.local_addr.clone(),
            remote_port: spec.remote_port,
            proto: spec.proto.to_string(),
            auth: spec.auth.clone(),
        }
    }
}

/// Check that a tunnel name is usable as both a DNS label and a container
/// name.
///
/// # Errors
///
/// Returns `ControlError::Validation` if the name is empty, too long, uses
/// characters other than ASCII alphanumerics and `-`, or starts or ends
/// with `-`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ControlError::Validation("name is required".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ControlError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(ControlError::Validation(
            "name may only contain letters, digits and '-'".into(),
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(ControlError::Validation(
            "name must not start or end with '-'".into(),
        ));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// A tunnel record joined with its live container state.
#[derive(Debug, Clone, Serialize)]
pub struct TunnelView {
    /// The persisted record.
    #[serde(flatten)]
    pub tunnel: Tunnel,
    /// Engine name of the tunnel's container.
    pub container_name: String,
    /// Live container state.
    pub state: TunnelState,
    /// Whether a container exists.
    pub exists: bool,
    /// Announced endpoint, only while running.
    pub status: Option<StatusInfo>,
}

/// Window over a tunnel's log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOptions {
    /// Lines to skip from the start.
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of lines to return.
    #[serde(default = "LogOptions::default_limit")]
    pub limit: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::default_limit(),
        }
    }
}

impl LogOptions {
    const fn default_limit() -> usize {
        1000
    }

    /// Apply the window to a sequence of lines.
    #[must_use]
    pub fn apply<T>(&self, lines: Vec<T>) -> Vec<T> {
        lines
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

/// Configuration for the tunnel service.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Image every agent container runs.
    pub image: String,
    /// Agent settings baked into each config document.
    pub agent: AgentSettings,
    /// Where this process sees the runtime dir. Config files are written
    /// under its config subdirectory.
    pub local_runtime_dir: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let agent = AgentSettings::default();
        Self {
            image: "alpine:latest".to_string(),
            local_runtime_dir: PathBuf::from(&agent.runtime_dir_in_container),
            agent,
        }
    }
}

impl ControlConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `AGENT_IMAGE`: Agent container image
    /// - `LOCAL_RUNTIME_DIR`: Runtime dir as seen by this process
    ///
    /// Agent settings are read by [`AgentSettings::from_env`].
    #[must_use]
    pub fn from_env() -> Self {
        let agent = AgentSettings::from_env();
        let mut config = Self {
            local_runtime_dir: PathBuf::from(&agent.runtime_dir_in_container),
            agent,
            ..Self::default()
        };

        if let Ok(val) = std::env::var("AGENT_IMAGE") {
            config.image = val;
        }
        if let Ok(val) = std::env::var("LOCAL_RUNTIME_DIR") {
            config.local_runtime_dir = PathBuf::from(val);
        }

        config
    }

    /// Directory config files are written to.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.local_runtime_dir.join(&self.agent.config_dirname)
    }
}
