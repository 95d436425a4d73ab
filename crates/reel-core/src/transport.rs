// ── Transport seam ──
//
// The subscription adapter talks to this trait rather than to `WsClient`
// directly, so a single shared client can back any number of adapters and
// tests can drive the adapter without a socket.

use reel_api::{MessageStream, MessageType, StateChange, WsClient};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::CoreError;

/// A shared, message-type-multiplexed duplex channel.
pub trait Transport: Send + Sync + 'static {
    /// Inbound messages tagged `message_type`. Dropping the stream cancels it.
    fn on(&self, message_type: &MessageType) -> MessageStream;

    /// Queue an outbound message. Must not block.
    fn send(&self, message: &Value) -> Result<(), CoreError>;

    /// Connection state transitions.
    fn connection_state(&self) -> watch::Receiver<StateChange>;
}

impl Transport for WsClient {
    fn on(&self, message_type: &MessageType) -> MessageStream {
        WsClient::on(self, message_type)
    }

    fn send(&self, message: &Value) -> Result<(), CoreError> {
        WsClient::send(self, message).map_err(CoreError::from)
    }

    fn connection_state(&self) -> watch::Receiver<StateChange> {
        WsClient::connection_state(self)
    }
}
