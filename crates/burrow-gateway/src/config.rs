//! Gateway configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins. `*` allows any.
    #[serde(default = "GatewayConfig::default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_cors_origins() -> Vec<String> {
        vec!["*".to_string()]
    }

    const fn default_max_body() -> usize {
        64 * 1024 // 64 KB
    }

    const fn default_request_timeout() -> u64 {
        // Rebuilds wait on the engine pulling and starting containers.
        120
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `LISTEN_ADDR`: Listen address
    /// - `CORS_ORIGINS`: Comma-separated allowed origins
    /// - `MAX_BODY_BYTES`: Request body limit
    /// - `REQUEST_TIMEOUT_SECONDS`: Response timeout
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Ok(val) = std::env::var("CORS_ORIGINS") {
            config.cors_origins = parse_origins(&val);
        }
        if let Ok(val) = std::env::var("MAX_BODY_BYTES") {
            if let Ok(n) = val.parse() {
                config.max_body_bytes = n;
            }
        }
        if let Ok(val) = std::env::var("REQUEST_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_seconds = n;
            }
        }

        config
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: Self::default_cors_origins(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect()
}
