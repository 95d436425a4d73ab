// reel-core: data access and typed realtime subscriptions on top of reel-api.

pub mod cinemas;
pub mod config;
pub mod db;
pub mod error;
pub mod subscription;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cinemas::{Cinema, CinemaPatch, Cinemas, NewCinema};
pub use config::ClientConfig;
pub use db::{Database, DbError, MemoryDatabase, RecordId, Table};
pub use error::CoreError;
pub use subscription::{Subscription, SubscriptionOptions, Unsubscribe};
pub use transport::Transport;

// Wire types consumers need alongside the adapter.
pub use reel_api::{
    ConnectionState, MessageStream, MessageType, ResponseMessage, ResponseStatus, StateChange,
    WsClient,
};
