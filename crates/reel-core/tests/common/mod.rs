// Shared fixtures for reel-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reel_core::{
    ConnectionState, CoreError, MessageStream, MessageType, ResponseMessage, StateChange,
    Transport,
};
use serde_json::Value;
use tokio::sync::{broadcast, watch};

/// In-process transport: tests push inbound messages and state transitions
/// and inspect what was sent.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    inbound: broadcast::Sender<Arc<ResponseMessage>>,
    state: watch::Sender<StateChange>,
    sent: Mutex<Vec<Value>>,
    on_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(64);
        let (state, _) = watch::channel(StateChange {
            state: ConnectionState::Connected,
            prev_state: None,
        });
        Self {
            inner: Arc::new(MockInner {
                inbound,
                state,
                sent: Mutex::new(Vec::new()),
                on_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Publish a raw server message to every open stream.
    pub fn emit(&self, message: Value) {
        let message: ResponseMessage = serde_json::from_value(message).unwrap();
        let _ = self.inner.inbound.send(Arc::new(message));
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_modify(|current| {
            current.prev_state = Some(current.state);
            current.state = state;
        });
    }

    /// Streams currently open against this transport.
    pub fn active_streams(&self) -> usize {
        self.inner.inbound.receiver_count()
    }

    pub fn on_calls(&self) -> usize {
        self.inner.on_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Value> {
        self.inner.sent.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn on(&self, message_type: &MessageType) -> MessageStream {
        self.inner.on_calls.fetch_add(1, Ordering::SeqCst);
        MessageStream::new(message_type.clone(), self.inner.inbound.subscribe())
    }

    fn send(&self, message: &Value) -> Result<(), CoreError> {
        self.inner.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn connection_state(&self) -> watch::Receiver<StateChange> {
        self.inner.state.subscribe()
    }
}

/// Collects whatever a handler is given.
#[derive(Clone)]
pub struct Recorder<M> {
    seen: Arc<Mutex<Vec<M>>>,
}

impl<M: Clone + Send + 'static> Recorder<M> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, item: M) {
        self.seen.lock().unwrap().push(item);
    }

    pub fn seen(&self) -> Vec<M> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// Let spawned bindings and watchers run to quiescence.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
