//! Tunnel protocols.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a protocol string is not one of `http`, `https` or `tcp`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported protocol {0:?}: expected http, https or tcp")]
pub struct ProtoError(pub String);

/// The protocol a tunnel exposes its local address over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// Raw TCP forwarding.
    Tcp,
}

impl Proto {
    /// The lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
        }
    }

    /// Only TCP tunnels can request a fixed remote port.
    #[must_use]
    pub const fn supports_remote_port(self) -> bool {
        matches!(self, Self::Tcp)
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Proto {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "tcp" => Ok(Self::Tcp),
            _ => Err(ProtoError(s.to_string())),
        }
    }
}
