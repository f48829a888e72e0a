//! Domain types stored in the database.
//!
//! These types represent the persisted desired state of each tunnel.

use burrow_core::{Proto, TunnelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user-supplied description of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSpec {
    /// Unique name, also used as the public subdomain.
    pub name: String,
    /// Custom public hostname, if any.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Local address the agent forwards to, such as `127.0.0.1:8080`.
    pub local_addr: String,
    /// Requested public port. Only honored for TCP tunnels.
    #[serde(default)]
    pub remote_port: Option<u16>,
    /// Exposed protocol.
    pub proto: Proto,
    /// Credentials gating the public endpoint (`user:password`).
    #[serde(default)]
    pub auth: Option<String>,
}

impl TunnelSpec {
    /// Create a spec with only the required fields set.
    #[must_use]
    pub fn new(name: impl Into<String>, local_addr: impl Into<String>, proto: Proto) -> Self {
        Self {
            name: name.into(),
            hostname: None,
            local_addr: local_addr.into(),
            remote_port: None,
            proto,
            auth: None,
        }
    }
}

/// A tunnel record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tunnel {
    /// Store-assigned identifier.
    pub id: TunnelId,
    /// Desired tunnel configuration.
    pub spec: TunnelSpec,
    /// Epoch seconds of the last start or rebuild. Zero until first started.
    pub start_time: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Tunnel {
    /// The tunnel's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}
