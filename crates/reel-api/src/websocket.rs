//! WebSocket client with auto-reconnect.
//!
//! Connects to the reel realtime endpoint, parses inbound frames into
//! [`ResponseMessage`]s and fans them out through a
//! [`tokio::sync::broadcast`] channel. Outbound requests are queued on a
//! bounded mpsc and written whenever a connection is up. Reconnection uses
//! exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use reel_api::{MessageType, WsClient, WsConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("wss://reel.example.com/ws")?;
//! let client = WsClient::connect(url, WsConfig::default(), CancellationToken::new())?;
//!
//! let mut cinemas = client.on(&MessageType::from("cinemas"));
//! while let Some(msg) = cinemas.next().await {
//!     println!("{} {:?}", msg.status, msg.data);
//! }
//!
//! client.shutdown();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::message::{MessageType, ResponseMessage};

// ── Channel capacities ───────────────────────────────────────────────

const INBOUND_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state of the background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// A single state transition, as published on the state watch channel.
///
/// `prev_state` is `None` only for the initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub state: ConnectionState,
    pub prev_state: Option<ConnectionState>,
}

impl StateChange {
    fn initial() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            prev_state: None,
        }
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Everything the client needs besides the URL.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub reconnect: ReconnectConfig,

    /// Sent as `Authorization: Bearer <token>` on the upgrade request.
    pub token: Option<SecretString>,

    /// Broadcast capacity for inbound messages. Slow consumers lag past this.
    pub inbound_capacity: usize,

    /// Bounded queue for outbound requests.
    pub outbound_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            token: None,
            inbound_capacity: INBOUND_CHANNEL_CAPACITY,
            outbound_capacity: OUTBOUND_CHANNEL_CAPACITY,
        }
    }
}

// ── WsClient ─────────────────────────────────────────────────────────

/// Shared handle to a running WebSocket connection.
///
/// Cheaply cloneable. The background task stops on
/// [`shutdown`](Self::shutdown), when the cancellation token passed to
/// [`connect`](Self::connect) fires, or when the last handle is dropped.
#[derive(Clone)]
pub struct WsClient {
    inner: Arc<WsInner>,
}

struct WsInner {
    inbound_tx: broadcast::Sender<Arc<ResponseMessage>>,
    outbound_tx: mpsc::Sender<String>,
    outbound_capacity: usize,
    state: watch::Sender<StateChange>,
    cancel: CancellationToken,
}

impl Drop for WsInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl WsClient {
    /// Validate the URL and spawn the connection loop.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Must be called from within a Tokio runtime.
    pub fn connect(url: Url, config: WsConfig, cancel: CancellationToken) -> Result<Self, Error> {
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(Error::UnsupportedScheme(other.to_owned())),
        }

        // Dropping the client must not cancel the caller's token.
        let cancel = cancel.child_token();

        let (inbound_tx, _) = broadcast::channel(config.inbound_capacity.max(1));
        let outbound_capacity = config.outbound_capacity.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity);
        let (state, _) = watch::channel(StateChange::initial());

        let link = Link {
            inbound_tx: inbound_tx.clone(),
            outbound_rx,
            state: state.clone(),
        };

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(url, config, link, task_cancel).await;
        });

        Ok(Self {
            inner: Arc::new(WsInner {
                inbound_tx,
                outbound_tx,
                outbound_capacity,
                state,
                cancel,
            }),
        })
    }

    /// Stream of inbound messages carrying `message_type`.
    ///
    /// Each call creates an independent receiver; dropping it cancels the
    /// subscription.
    pub fn on(&self, message_type: &MessageType) -> MessageStream {
        MessageStream::new(message_type.clone(), self.inner.inbound_tx.subscribe())
    }

    /// Queue a JSON message for sending. Never blocks.
    ///
    /// Messages queued while disconnected are written after the next
    /// successful connect.
    pub fn send(&self, message: &Value) -> Result<(), Error> {
        let text = serde_json::to_string(message)?;
        self.inner.outbound_tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull {
                capacity: self.inner.outbound_capacity,
            },
            mpsc::error::TrySendError::Closed(_) => Error::Closed,
        })
    }

    /// Subscribe to connection state transitions.
    pub fn connection_state(&self) -> watch::Receiver<StateChange> {
        self.inner.state.subscribe()
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().state
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

// ── MessageStream ────────────────────────────────────────────────────

/// Inbound messages of a single type.
///
/// Other message types are skipped. If the consumer falls behind the
/// broadcast capacity the gap is logged and reading continues.
pub struct MessageStream {
    message_type: MessageType,
    rx: broadcast::Receiver<Arc<ResponseMessage>>,
}

impl MessageStream {
    pub fn new(message_type: MessageType, rx: broadcast::Receiver<Arc<ResponseMessage>>) -> Self {
        Self { message_type, rx }
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    /// Next message of this stream's type, or `None` once the sender is gone.
    ///
    /// Cancel-safe: dropping the future loses no message.
    pub async fn next(&mut self) -> Option<Arc<ResponseMessage>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if msg.message_type == self.message_type => return Some(msg),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        message_type = %self.message_type,
                        skipped,
                        "message stream lagged, messages dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Channel ends owned by the background task.
struct Link {
    inbound_tx: broadcast::Sender<Arc<ResponseMessage>>,
    outbound_rx: mpsc::Receiver<String>,
    state: watch::Sender<StateChange>,
}

impl Link {
    /// Publish a transition. Repeats of the current state are swallowed.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if current.state == next {
                return false;
            }
            *current = StateChange {
                state: next,
                prev_state: Some(current.state),
            };
            true
        });
    }
}

/// Main loop: connect → pump frames → on error, backoff → reconnect.
async fn ws_loop(url: Url, config: WsConfig, mut link: Link, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        link.set_state(if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting { attempt }
        });

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_pump(&url, config.token.as_ref(), &mut link, &cancel) => result,
        };

        match result {
            // Clean disconnect (close frame or stream ended).
            // Reset attempt counter; wait the initial delay before reconnecting.
            Ok(()) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::info!(
                    delay_ms = u64::try_from(config.reconnect.initial_delay.as_millis())
                        .unwrap_or(u64::MAX),
                    "WebSocket disconnected cleanly, reconnecting"
                );
                attempt = 0;

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(config.reconnect.initial_delay) => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "WebSocket error");

                if !e.is_transient() {
                    tracing::error!(error = %e, "WebSocket error is not recoverable, giving up");
                    link.set_state(ConnectionState::Failed);
                    return;
                }

                if let Some(max) = config.reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "WebSocket reconnection limit reached, giving up"
                        );
                        link.set_state(ConnectionState::Failed);
                        return;
                    }
                }

                link.set_state(ConnectionState::Reconnecting {
                    attempt: attempt + 1,
                });

                let delay = calculate_backoff(attempt, &config.reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    link.set_state(ConnectionState::Disconnected);
    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single connection and pump frames both ways until it drops.
async fn connect_and_pump(
    url: &Url,
    token: Option<&SecretString>,
    link: &mut Link,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::InvalidRequest(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = token {
        request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(handshake_error)?;

    tracing::info!("WebSocket connected");
    link.set_state(ConnectionState::Connected);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, &link.inbound_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong; it goes out with the next write
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            outgoing = link.outbound_rx.recv() => {
                let Some(text) = outgoing else {
                    // Every client handle is gone.
                    return Ok(());
                };
                tracing::debug!(bytes = text.len(), "WebSocket send");
                write
                    .send(tungstenite::Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
        }
    }
}

fn handshake_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            Error::Unauthorized {
                status: response.status().as_u16(),
            }
        }
        tungstenite::Error::Url(e) => Error::InvalidRequest(e.to_string()),
        other => Error::WebSocketConnect(other.to_string()),
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame and broadcast it. Malformed frames are dropped.
fn parse_and_broadcast(text: &str, inbound_tx: &broadcast::Sender<Arc<ResponseMessage>>) {
    let message: ResponseMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket message");
            return;
        }
    };

    tracing::trace!(
        message_type = %message.message_type,
        status = %message.status,
        "WebSocket message"
    );

    // Ignore send errors -- just means no active subscribers right now
    let _ = inbound_tx.send(Arc::new(message));
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
