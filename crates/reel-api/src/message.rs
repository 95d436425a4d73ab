// ── Wire types ──
//
// Every frame is a JSON object. Inbound frames carry `{type, status, data | error}`;
// outbound frames carry `type` plus whatever body the caller supplies.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag naming the resource a message belongs to, e.g. `"cinemas"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(String);

impl MessageType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The four mutually exclusive categories a response can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResponseStatus {
    Snapshot,
    Update,
    Success,
    Error,
}

/// A server → client message.
///
/// `T` defaults to raw JSON; the transport only ever produces
/// `ResponseMessage<Value>` and consumers decode into their own payload
/// type with [`decode`](ResponseMessage::decode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage<T = Value> {
    #[serde(rename = "type")]
    pub message_type: MessageType,

    pub status: ResponseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseMessage<Value> {
    /// Decode the `data` payload into a typed message.
    ///
    /// Messages without `data` (typically errors) decode to `data: None`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<ResponseMessage<T>, serde_json::Error> {
        let data = match &self.data {
            Some(Value::Null) | None => None,
            Some(value) => Some(T::deserialize(value)?),
        };

        Ok(ResponseMessage {
            message_type: self.message_type.clone(),
            status: self.status,
            data,
            error: self.error.clone(),
        })
    }
}

impl<T> ResponseMessage<T> {
    /// Human-readable error text for an `error` message.
    pub fn error_description(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// A client → server message: the caller's body with `type` stamped on.
///
/// The body is flattened, so it must serialize as a JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage<B> {
    #[serde(rename = "type")]
    pub message_type: MessageType,

    #[serde(flatten)]
    pub body: B,
}

impl<B: Serialize> RequestMessage<B> {
    pub fn new(message_type: MessageType, body: B) -> Self {
        Self { message_type, body }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
