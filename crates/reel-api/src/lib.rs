// reel-api: WebSocket transport and wire types for the reel realtime API.

pub mod error;
pub mod message;
pub mod websocket;

pub use error::Error;
pub use message::{MessageType, RequestMessage, ResponseMessage, ResponseStatus};
pub use websocket::{
    ConnectionState, MessageStream, ReconnectConfig, StateChange, WsClient, WsConfig,
};
