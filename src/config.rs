//! Crate configuration.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete tether configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TetherConfig {
    /// Backend base URL, no trailing slash.
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,
    /// How often the poller reconciles connection status (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// How long an authorization attempt's state token remains valid (seconds).
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: i64,
    /// Per-request timeout for backend calls (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_backend_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_state_ttl() -> i64 {
    600
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            backend_base_url: default_backend_base_url(),
            poll_interval_seconds: default_poll_interval(),
            state_ttl_seconds: default_state_ttl(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> Result<TetherConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{path}'"))?;
    let config: TetherConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file '{path}'"))?;
    Ok(config)
}
