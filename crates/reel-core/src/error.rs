// ── Core error types ──
//
// User-facing errors from reel-core. Consumers never see tungstenite or
// queue internals directly; the `From<reel_api::Error>` impl translates
// transport-layer errors into these variants. Database failures have their
// own type (`DbError`) and are passed through untouched.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("WebSocket connection error: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Transport closed")]
    Disconnected,

    #[error("Send queue full ({capacity} pending messages)")]
    Backpressure { capacity: usize },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<reel_api::Error> for CoreError {
    fn from(err: reel_api::Error) -> Self {
        match err {
            reel_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            reel_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Unsupported URL scheme '{scheme}' (expected ws or wss)"),
            },
            reel_api::Error::InvalidRequest(reason) => CoreError::Config {
                message: format!("Invalid WebSocket request: {reason}"),
            },
            reel_api::Error::Unauthorized { status } => CoreError::AuthenticationFailed {
                message: format!("server rejected the connection (HTTP {status})"),
            },
            reel_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            reel_api::Error::QueueFull { capacity } => CoreError::Backpressure { capacity },
            reel_api::Error::Closed => CoreError::Disconnected,
            reel_api::Error::Serialization(e) => CoreError::from(e),
        }
    }
}
