//! Typed realtime subscriptions.
//!
//! A [`Subscription`] binds one [`MessageType`] to a shared [`Transport`]
//! and routes every inbound message onto one of four channels by status:
//! snapshot, update, success, or error. Handlers registered on those
//! channels, state-change watchers, and the low-level binding itself are
//! all tracked, so [`Subscription::unsubscribe`] releases everything at
//! once and dropping the subscription tears it down for good.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reel_core::{Cinema, Subscription, SubscriptionOptions};
//!
//! let cinemas = Subscription::<Vec<Cinema>>::new(
//!     Arc::new(ws_client),
//!     "cinemas",
//!     SubscriptionOptions::default().immediate().retry_on_reconnect(),
//! );
//!
//! let _stop = cinemas.on_snapshot(|msg| println!("{} cinemas", msg.data.as_ref().map_or(0, Vec::len)));
//! let _ = cinemas.on_error(|err| eprintln!("cinemas: {err}"));
//! cinemas.send(&serde_json::json!({ "action": "list" }))?;
//! ```

mod channel;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use reel_api::{
    ConnectionState, MessageStream, MessageType, RequestMessage, ResponseMessage, ResponseStatus,
    StateChange,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::transport::Transport;

use self::channel::{Channel, ChannelKind, Handler};

/// Registration key reserved for the low-level binding.
const BINDING_KEY: u64 = 0;

// ── Options ──────────────────────────────────────────────────────────

/// Behavior switches for a [`Subscription`]. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Subscribe as soon as the adapter is constructed.
    pub immediate: bool,
    /// Resubscribe every time the transport transitions to `Connected`.
    pub retry_on_reconnect: bool,
    /// Unsubscribe after the first received message.
    pub once: bool,
}

impl SubscriptionOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn retry_on_reconnect(mut self) -> Self {
        self.retry_on_reconnect = true;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

// ── Unsubscribe handle ───────────────────────────────────────────────

trait Untrack: Send + Sync {
    fn untrack(&self, id: u64);
}

/// Cancels one handler registration.
///
/// Dropping the handle does *not* cancel; the registration then lives until
/// [`Subscription::unsubscribe`] or teardown.
#[must_use = "dropping the handle keeps the handler registered"]
pub struct Unsubscribe {
    target: Option<(Weak<dyn Untrack>, u64)>,
}

impl Unsubscribe {
    fn new(target: Weak<dyn Untrack>, id: u64) -> Self {
        Self {
            target: Some((target, id)),
        }
    }

    /// Handle for a registration that was refused (subscription closed).
    fn inert() -> Self {
        Self { target: None }
    }

    pub fn unsubscribe(self) {
        if let Some((target, id)) = self.target {
            if let Some(target) = target.upgrade() {
                target.untrack(id);
            }
        }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.target.as_ref().map(|(_, id)| *id))
            .finish()
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Something cancellable that belongs to a subscription.
enum Registration {
    /// A spawned task: the binding or a state watcher.
    Task(CancellationToken),
    /// A handler on one of the four channels.
    Handler(ChannelKind),
}

struct Channels<T> {
    snapshot: Channel<ResponseMessage<T>>,
    update: Channel<ResponseMessage<T>>,
    success: Channel<ResponseMessage<T>>,
    error: Channel<String>,
}

impl<T> Channels<T> {
    fn new() -> Self {
        Self {
            snapshot: Channel::new(),
            update: Channel::new(),
            success: Channel::new(),
            error: Channel::new(),
        }
    }

    fn remove(&self, kind: ChannelKind, id: u64) {
        match kind {
            ChannelKind::Snapshot => self.snapshot.remove(id),
            ChannelKind::Update => self.update.remove(id),
            ChannelKind::Success => self.success.remove(id),
            ChannelKind::Error => self.error.remove(id),
        };
    }

    fn complete(&self) {
        self.snapshot.complete();
        self.update.complete();
        self.success.complete();
        self.error.complete();
    }
}

/// Typed adapter from one message type on a shared transport to four
/// status channels.
///
/// Requires a Tokio runtime: bindings and state watchers run as spawned
/// tasks. Dropping the subscription is equivalent to [`close`](Self::close).
pub struct Subscription<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    message_type: MessageType,
    options: SubscriptionOptions,
    transport: Arc<dyn Transport>,
    /// True once the current binding has delivered a message.
    subscribed: watch::Sender<bool>,
    registrations: DashMap<u64, Registration>,
    next_id: AtomicU64,
    channels: Channels<T>,
    closed: AtomicBool,
}

impl<T> Subscription<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        transport: Arc<dyn Transport>,
        message_type: impl Into<MessageType>,
        options: SubscriptionOptions,
    ) -> Self {
        let (subscribed, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            message_type: message_type.into(),
            options,
            transport,
            subscribed,
            registrations: DashMap::new(),
            next_id: AtomicU64::new(BINDING_KEY + 1),
            channels: Channels::new(),
            closed: AtomicBool::new(false),
        });

        if options.immediate {
            inner.subscribe();
        }

        if options.retry_on_reconnect {
            let weak = Arc::downgrade(&inner);
            inner.watch_state(move |change| {
                if change.state == ConnectionState::Connected {
                    if let Some(inner) = weak.upgrade() {
                        debug!(message_type = %inner.message_type, "transport reconnected, resubscribing");
                        inner.resubscribe();
                    }
                }
            });
        }

        Self { inner }
    }

    pub fn message_type(&self) -> &MessageType {
        &self.inner.message_type
    }

    pub fn options(&self) -> SubscriptionOptions {
        self.inner.options
    }

    // ── Binding lifecycle ────────────────────────────────────────────

    /// Open the binding unless one has already delivered a message.
    pub fn subscribe(&self) {
        self.inner.subscribe();
    }

    /// Cancel the binding and every tracked registration.
    pub fn unsubscribe(&self) {
        self.inner.unsubscribe();
    }

    /// Force a fresh binding, e.g. after the connection was lost.
    pub fn resubscribe(&self) {
        self.inner.resubscribe();
    }

    /// Whether the current binding has received at least one message.
    pub fn is_subscribed(&self) -> bool {
        *self.inner.subscribed.borrow()
    }

    /// Observe [`is_subscribed`](Self::is_subscribed) reactively.
    pub fn subscribed(&self) -> watch::Receiver<bool> {
        self.inner.subscribed.subscribe()
    }

    /// Number of live tracked registrations, the binding included.
    pub fn active_registrations(&self) -> usize {
        self.inner.registrations.len()
    }

    /// Tear down for good: unsubscribe and complete all four channels.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Send `body` with this subscription's `type` stamped on.
    ///
    /// `body` must serialize to a JSON object.
    pub fn send<B: Serialize + ?Sized>(&self, body: &B) -> Result<(), CoreError> {
        let message = RequestMessage::new(self.inner.message_type.clone(), body).to_json()?;
        debug!(message_type = %self.inner.message_type, "sending request");
        self.inner.transport.send(&message)
    }

    // ── Channel handlers ─────────────────────────────────────────────

    pub fn on_snapshot(
        &self,
        handler: impl Fn(&ResponseMessage<T>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.add_handler(ChannelKind::Snapshot, |channels, id| {
            channels.snapshot.register(id, Arc::new(handler))
        })
    }

    pub fn on_update(
        &self,
        handler: impl Fn(&ResponseMessage<T>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.add_handler(ChannelKind::Update, |channels, id| {
            channels.update.register(id, Arc::new(handler))
        })
    }

    pub fn on_success(
        &self,
        handler: impl Fn(&ResponseMessage<T>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.add_handler(ChannelKind::Success, |channels, id| {
            channels.success.register(id, Arc::new(handler))
        })
    }

    /// Error handlers receive the server's error text, or a description of
    /// a payload that could not be decoded.
    pub fn on_error(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Unsubscribe {
        let wrapped: Handler<String> = Arc::new(move |err: &String| handler(err.as_str()));
        self.add_handler(ChannelKind::Error, |channels, id| {
            channels.error.register(id, wrapped)
        })
    }

    /// Called with `(state, prev_state)` on every later connection transition.
    ///
    /// Transitions that happen faster than the handler runs are coalesced;
    /// `prev_state` always describes the transition being reported.
    pub fn on_state_change(
        &self,
        handler: impl Fn(ConnectionState, Option<ConnectionState>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        if self.is_closed() {
            return Unsubscribe::inert();
        }
        let id = self
            .inner
            .watch_state(move |change| handler(change.state, change.prev_state));
        self.handle(id)
    }

    fn add_handler(
        &self,
        kind: ChannelKind,
        register: impl FnOnce(&Channels<T>, u64) -> bool,
    ) -> Unsubscribe {
        let id = self.inner.next_id();
        if !register(&self.inner.channels, id) {
            return Unsubscribe::inert();
        }
        self.inner
            .registrations
            .insert(id, Registration::Handler(kind));
        self.handle(id)
    }

    fn handle(&self, id: u64) -> Unsubscribe {
        let target: Weak<dyn Untrack> = Arc::downgrade(&self.inner) as Weak<dyn Untrack>;
        Unsubscribe::new(target, id)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

// ── Inner state ──────────────────────────────────────────────────────

impl<T> Inner<T> {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn cancel_registration(&self, id: u64) -> bool {
        let Some((_, registration)) = self.registrations.remove(&id) else {
            return false;
        };
        match registration {
            Registration::Task(token) => token.cancel(),
            Registration::Handler(kind) => self.channels.remove(kind, id),
        }
        true
    }

    fn unsubscribe(&self) {
        let ids: Vec<u64> = self.registrations.iter().map(|r| *r.key()).collect();
        for id in ids {
            self.cancel_registration(id);
        }
        self.subscribed.send_if_modified(|bound| std::mem::replace(bound, false));
        debug!(message_type = %self.message_type, "unsubscribed");
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.unsubscribe();
        self.channels.complete();
        debug!(message_type = %self.message_type, "subscription closed");
    }

    fn mark_subscribed(&self) {
        self.subscribed.send_if_modified(|bound| !std::mem::replace(bound, true));
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn subscribe(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) || *self.subscribed.borrow() {
            return;
        }

        if self.cancel_registration(BINDING_KEY) {
            debug!(message_type = %self.message_type, "cancelled stale binding");
        }

        let token = CancellationToken::new();
        let stream = self.transport.on(&self.message_type);
        self.registrations
            .insert(BINDING_KEY, Registration::Task(token.clone()));

        tokio::spawn(binding_task(Arc::downgrade(self), stream, token));
        debug!(message_type = %self.message_type, "binding opened");
    }

    fn resubscribe(self: &Arc<Self>) {
        self.subscribed.send_if_modified(|bound| std::mem::replace(bound, false));
        self.subscribe();
    }

    /// Spawn a tracked watcher over connection state transitions.
    fn watch_state(&self, on_change: impl Fn(StateChange) + Send + Sync + 'static) -> u64 {
        let id = self.next_id();
        let token = CancellationToken::new();
        let mut state = self.transport.connection_state();
        // Only transitions from here on.
        state.borrow_and_update();

        self.registrations
            .insert(id, Registration::Task(token.clone()));
        tokio::spawn(state_task(state, token, on_change));
        id
    }

    /// Route one inbound message to its status channel.
    fn dispatch(&self, raw: &ResponseMessage) {
        let channel = match raw.status {
            ResponseStatus::Snapshot => &self.channels.snapshot,
            ResponseStatus::Update => &self.channels.update,
            ResponseStatus::Success => &self.channels.success,
            ResponseStatus::Error => {
                self.channels.error.emit(&raw.error_description().to_owned());
                return;
            }
        };

        match raw.decode::<T>() {
            Ok(message) => {
                channel.emit(&message);
            }
            Err(e) => {
                warn!(
                    message_type = %self.message_type,
                    status = %raw.status,
                    error = %e,
                    "undecodable payload"
                );
                self.channels.error.emit(&format!(
                    "failed to decode {} {} payload: {e}",
                    self.message_type, raw.status
                ));
            }
        }
    }
}

impl<T: Send + Sync> Untrack for Inner<T> {
    fn untrack(&self, id: u64) {
        self.cancel_registration(id);
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Pump one binding until it is cancelled or the transport goes away.
async fn binding_task<T>(inner: Weak<Inner<T>>, mut stream: MessageStream, token: CancellationToken)
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    loop {
        let message = tokio::select! {
            biased;
            () = token.cancelled() => break,
            message = stream.next() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let Some(sub) = inner.upgrade() else { break };

        sub.dispatch(&message);

        // A handler may have unsubscribed or rebound this subscription.
        if token.is_cancelled() {
            break;
        }
        sub.mark_subscribed();

        if sub.options.once {
            sub.unsubscribe();
            break;
        }
    }

    debug!(message_type = %stream.message_type(), "binding task exiting");
}

async fn state_task(
    mut state: watch::Receiver<StateChange>,
    token: CancellationToken,
    on_change: impl Fn(StateChange) + Send + Sync + 'static,
) {
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let change = *state.borrow_and_update();
                on_change(change);
            }
        }
    }
}
