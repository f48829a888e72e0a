//! Types for the container runtime.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Opaque engine identifier for a container.
///
/// Never persisted: callers recover it by looking the container up by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    /// Wrap an engine-issued container id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw engine id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine-reported container status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Created but never started.
    Created,
    /// Main process is running.
    Running,
    /// Frozen by the engine.
    Paused,
    /// Being restarted by the engine's restart policy.
    Restarting,
    /// Removal in progress.
    Removing,
    /// Main process has exited.
    Exited,
    /// Engine failed to stop or remove it.
    Dead,
    /// Status could not be determined.
    Unknown,
}

impl ContainerStatus {
    /// Whether the agent process should be considered up.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Restarting)
    }
}

/// Everything needed to create a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name, unique on the engine.
    pub name: String,
    /// Image reference, such as `alpine:latest`.
    pub image: String,
    /// Entrypoint argv.
    pub command: Vec<String>,
    /// Bind mounts in `host:container[:mode]` form.
    pub binds: Vec<String>,
}

/// A single line of container output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    /// Engine timestamp, when the engine was asked to attach one.
    pub timestamp: Option<DateTime<Utc>>,
    /// The line text, without trailing newline.
    pub message: String,
}

impl LogLine {
    /// Create a timestamped line.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp),
            message: message.into(),
        }
    }

    /// Split a raw engine line of the form `<rfc3339> <message>`.
    ///
    /// Lines without a parseable timestamp prefix are kept whole.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if let Some((prefix, rest)) = raw.split_once(' ') {
            if let Ok(ts) = DateTime::parse_from_rfc3339(prefix) {
                return Self {
                    timestamp: Some(ts.with_timezone(&Utc)),
                    message: rest.to_string(),
                };
            }
        }
        Self {
            timestamp: None,
            message: raw.to_string(),
        }
    }

    /// Whether the line was emitted at or after `since` (epoch seconds).
    ///
    /// Untimestamped lines are kept, since they cannot be placed.
    #[must_use]
    pub fn is_since(&self, since: i64) -> bool {
        self.timestamp.map_or(true, |ts| ts.timestamp() >= since)
    }
}

/// Configuration for the Docker backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Engine endpoint: `unix://...`, `tcp://...` or `http://...`.
    /// Local defaults (honoring `DOCKER_HOST`) when unset.
    pub docker_url: Option<String>,
    /// Seconds the engine waits for a graceful stop before killing.
    pub stop_timeout_seconds: i32,
    /// Client request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_url: None,
            stop_timeout_seconds: 10,
            request_timeout_seconds: 120,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `DOCKER_URL`: Engine endpoint
    /// - `STOP_TIMEOUT_SECONDS`: Graceful stop timeout
    /// - `DOCKER_TIMEOUT_SECONDS`: Client request timeout
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DOCKER_URL") {
            if !val.trim().is_empty() {
                config.docker_url = Some(val);
            }
        }
        if let Ok(val) = std::env::var("STOP_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.stop_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("DOCKER_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_seconds = n;
            }
        }

        config
    }
}
