//! Tunnel agent configuration.
//!
//! Turns a persisted tunnel into everything the container engine needs to
//! run its agent: the YAML configuration document, the agent command line,
//! and the read-only bind that exposes the config directory inside the
//! container. Nothing here touches the filesystem or the engine.

use std::collections::BTreeMap;

use burrow_store::{Tunnel, TunnelSpec};
use serde::{Deserialize, Serialize};

/// Key of the single tunnel entry in every generated document.
pub const TUNNEL_KEY: &str = "default";

/// Agent-wide settings shared by every tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Address of the tunnel server the agent registers with.
    pub server_addr: String,
    /// Whether the agent trusts the host's root certificates.
    pub trust_host_root_certs: bool,
    /// Host directory holding the agent binary and config files.
    pub runtime_dir: String,
    /// Where `runtime_dir` is mounted inside agent containers.
    pub runtime_dir_in_container: String,
    /// Subdirectory of the runtime dir holding generated configs.
    pub config_dirname: String,
    /// Agent executable name inside the runtime dir.
    pub binary_name: String,
    /// Agent log level flag value.
    pub log_level: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            server_addr: "tunnel.example.com:4443".to_string(),
            trust_host_root_certs: false,
            runtime_dir: "/opt/burrow/runtime".to_string(),
            runtime_dir_in_container: "/release".to_string(),
            config_dirname: "yaml".to_string(),
            binary_name: "ngrok".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl AgentSettings {
    /// Load settings from environment variables.
    ///
    /// Supported environment variables:
    /// - `SERVER_ADDR`: Tunnel server address
    /// - `TRUST_HOST_ROOT_CERTS`: `true` or `1` to trust host roots
    /// - `RUNTIME_DIR`: Host runtime directory (bind source)
    /// - `RUNTIME_DIR_IN_CONTAINER`: Mount point inside agent containers
    /// - `YAML_DIRNAME`: Config subdirectory name
    /// - `AGENT_BINARY`: Agent executable name
    /// - `AGENT_LOG_LEVEL`: Agent log level
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("SERVER_ADDR") {
            settings.server_addr = val;
        }
        if let Ok(val) = std::env::var("TRUST_HOST_ROOT_CERTS") {
            settings.trust_host_root_certs = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("RUNTIME_DIR") {
            settings.runtime_dir = val;
        }
        if let Ok(val) = std::env::var("RUNTIME_DIR_IN_CONTAINER") {
            settings.runtime_dir_in_container = val;
        }
        if let Ok(val) = std::env::var("YAML_DIRNAME") {
            settings.config_dirname = val;
        }
        if let Ok(val) = std::env::var("AGENT_BINARY") {
            settings.binary_name = val;
        }
        if let Ok(val) = std::env::var("AGENT_LOG_LEVEL") {
            settings.log_level = val;
        }

        settings
    }

    /// In-container path of a tunnel's config file.
    #[must_use]
    pub fn config_path_in_container(&self, tunnel_name: &str) -> String {
        format!(
            "{}/{}/{tunnel_name}.yml",
            self.runtime_dir_in_container.trim_end_matches('/'),
            self.config_dirname.trim_matches('/'),
        )
    }
}

/// Only `true` and `1` enable a flag.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// The agent's YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Tunnel server address.
    pub server_addr: String,
    /// Trust host root certificates.
    pub trust_host_root_certs: bool,
    /// Tunnel definitions, always exactly one under [`TUNNEL_KEY`].
    pub tunnels: BTreeMap<String, TunnelEntry>,
}

impl ConfigDocument {
    /// The single tunnel entry.
    #[must_use]
    pub fn entry(&self) -> Option<&TunnelEntry> {
        self.tunnels.get(TUNNEL_KEY)
    }
}

/// One tunnel definition inside a [`ConfigDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelEntry {
    /// Protocol to local address, e.g. `{tcp: "127.0.0.1:22"}`.
    pub proto: BTreeMap<String, String>,
    /// Fixed public port, TCP only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    /// Credentials gating the public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Requested public subdomain.
    pub subdomain: String,
    /// Custom public hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// Everything required to run one tunnel's agent container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPlan {
    /// Container name derived from the tunnel name.
    pub container_name: String,
    /// Document to write before the container is created.
    pub document: ConfigDocument,
    /// Where the agent reads `document` inside the container.
    pub config_path: String,
    /// Agent argv.
    pub command: Vec<String>,
    /// Bind mounts (`host:container:ro`).
    pub binds: Vec<String>,
}

/// Generate the container name for a tunnel.
///
/// The prefix keeps burrow containers recognisable. Distinct tunnel names
/// always yield distinct container names.
#[must_use]
pub fn container_name_for_tunnel(tunnel_name: &str) -> String {
    format!("burrow-tunnel-{tunnel_name}")
}

/// Build the agent configuration document for a spec.
#[must_use]
pub fn build_document(spec: &TunnelSpec, settings: &AgentSettings) -> ConfigDocument {
    let mut proto = BTreeMap::new();
    proto.insert(spec.proto.to_string(), spec.local_addr.clone());

    let entry = TunnelEntry {
        proto,
        remote_port: spec
            .remote_port
            .filter(|_| spec.proto.supports_remote_port()),
        auth: non_empty(spec.auth.as_deref()),
        subdomain: spec.name.clone(),
        hostname: non_empty(spec.hostname.as_deref()),
    };

    let mut tunnels = BTreeMap::new();
    tunnels.insert(TUNNEL_KEY.to_string(), entry);

    ConfigDocument {
        server_addr: settings.server_addr.clone(),
        trust_host_root_certs: settings.trust_host_root_certs,
        tunnels,
    }
}

/// Build the full agent plan for a tunnel.
#[must_use]
pub fn build_plan(tunnel: &Tunnel, settings: &AgentSettings) -> AgentPlan {
    let name = tunnel.name();
    let container_dir = settings.runtime_dir_in_container.trim_end_matches('/');
    let config_path = settings.config_path_in_container(name);

    let command = vec![
        format!("{container_dir}/{}", settings.binary_name),
        format!("-log-level={}", settings.log_level),
        "-log=stdout".to_string(),
        "-config".to_string(),
        config_path.clone(),
        "start-all".to_string(),
    ];

    let binds = vec![format!(
        "{}:{container_dir}:ro",
        settings.runtime_dir.trim_end_matches('/')
    )];

    AgentPlan {
        container_name: container_name_for_tunnel(name),
        document: build_document(&tunnel.spec, settings),
        config_path,
        command,
        binds,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
