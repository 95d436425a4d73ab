// ── Runtime connection configuration ──
//
// Describes *how* to reach the realtime endpoint. Carries credentials and
// tuning but never touches disk; `reel-config` builds one of these from a
// profile and hands it in.

use std::time::Duration;

use reel_api::{ReconnectConfig, WsClient, WsConfig};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Configuration for one realtime connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint (e.g., `wss://reel.example.com/ws`).
    pub url: Url,
    /// Bearer token for the upgrade request.
    pub token: Option<SecretString>,
    /// First reconnect delay.
    pub reconnect_initial_delay: Duration,
    /// Backoff ceiling.
    pub reconnect_max_delay: Duration,
    /// Give up after this many failed attempts. `None` = never.
    pub max_retries: Option<u32>,
    /// Inbound broadcast capacity.
    pub inbound_capacity: usize,
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
}

impl ClientConfig {
    pub fn new(url: Url) -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            url,
            token: None,
            reconnect_initial_delay: reconnect.initial_delay,
            reconnect_max_delay: reconnect.max_delay,
            max_retries: reconnect.max_retries,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    pub fn ws_config(&self) -> WsConfig {
        WsConfig {
            reconnect: ReconnectConfig {
                initial_delay: self.reconnect_initial_delay,
                max_delay: self.reconnect_max_delay,
                max_retries: self.max_retries,
            },
            token: self.token.clone(),
            inbound_capacity: self.inbound_capacity,
            outbound_capacity: self.outbound_capacity,
        }
    }

    /// Start a WebSocket client for this configuration.
    ///
    /// The returned client connects in the background; watch
    /// [`WsClient::connection_state`] for progress.
    pub fn connect(&self, cancel: CancellationToken) -> Result<WsClient, CoreError> {
        tracing::debug!(url = %self.url, "starting realtime client");
        WsClient::connect(self.url.clone(), self.ws_config(), cancel).map_err(CoreError::from)
    }
}
