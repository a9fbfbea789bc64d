//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP listen address. Fixed; not read from the environment.
pub const LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the multi-device gateway
    pub gateway_url: String,

    /// API key sent to the gateway as `X-Api-Key`
    pub gateway_api_key: Option<String>,

    /// SQLite file holding the device identity
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Long-poll window for the event stream, in seconds
    #[serde(default = "default_event_poll_wait")]
    pub event_poll_wait_secs: u64,

    /// Delay between pairing status polls, in milliseconds
    #[serde(default = "default_pairing_poll_interval")]
    pub pairing_poll_interval_ms: u64,

    /// Log raw gateway payloads
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("whatsapp-relay.db")
}

fn default_event_poll_wait() -> u64 {
    25
}

fn default_pairing_poll_interval() -> u64 {
    1000
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gateway_url = std::env::var("GATEWAY_URL").context("GATEWAY_URL is required")?;

        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            gateway_api_key: std::env::var("GATEWAY_API_KEY").ok(),
            store_path: std::env::var("STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_store_path()),
            event_poll_wait_secs: std::env::var("EVENT_POLL_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_event_poll_wait),
            pairing_poll_interval_ms: std::env::var("PAIRING_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_pairing_poll_interval),
            debug_mode: std::env::var("DEBUG_MODE").is_ok(),
        })
    }

    /// Configuration pointing at `gateway_url` with defaults everywhere else
    pub fn for_gateway(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            gateway_api_key: None,
            store_path: default_store_path(),
            event_poll_wait_secs: default_event_poll_wait(),
            pairing_poll_interval_ms: default_pairing_poll_interval(),
            debug_mode: false,
        }
    }
}
