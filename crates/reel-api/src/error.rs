use thiserror::Error;

/// Top-level error type for the `reel-api` crate.
///
/// Covers URL validation, the WebSocket handshake, frame I/O, and the
/// outbound queue. `reel-core` maps these into `CoreError`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Addressing ──────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The URL parsed but is not a `ws://` or `wss://` URL.
    #[error("Unsupported URL scheme '{0}' (expected ws or wss)")]
    UnsupportedScheme(String),

    /// The upgrade request could not be built.
    #[error("Invalid WebSocket request: {0}")]
    InvalidRequest(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// Server rejected the upgrade with 401/403.
    #[error("WebSocket handshake rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    /// WebSocket connection failed or dropped with an I/O error.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Outbound queue ──────────────────────────────────────────────
    /// The outbound queue is full; the writer is not keeping up.
    #[error("Outbound queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The client has been shut down.
    #[error("WebSocket client is closed")]
    Closed,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WebSocketConnect(_) | Self::QueueFull { .. })
    }

    /// Returns `true` if the server refused our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
