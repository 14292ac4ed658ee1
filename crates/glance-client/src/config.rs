//! Client configuration.
//!
//! Endpoints are fixed at build time for this client; the struct exists so
//! tests and self-hosted setups can point elsewhere.

use std::time::Duration;

use glance_net::TransportOptions;
use glance_shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_WS_URL, HEARTBEAT_INTERVAL_MS, RECONNECT_DELAY_MS,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST origin, e.g. `http://localhost:8080`.
    pub api_base_url: String,
    /// Realtime endpoint, e.g. `ws://localhost:8080/ws`.
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub heartbeat: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            heartbeat: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
        }
    }
}

impl ClientConfig {
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            ws_url: self.ws_url.clone(),
            reconnect_delay: self.reconnect_delay,
            heartbeat: self.heartbeat,
        }
    }
}
