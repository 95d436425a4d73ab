// ── Per-status handler registry ──

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

pub(crate) type Handler<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Which of the four channels a handler lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelKind {
    Snapshot,
    Update,
    Success,
    Error,
}

/// A named stream of one message category.
///
/// Handlers are invoked synchronously, in registration order, on the task
/// that emits. Once completed, the channel drops every handler and ignores
/// further registrations and emissions.
pub(crate) struct Channel<M> {
    handlers: DashMap<u64, Handler<M>>,
    completed: AtomicBool,
}

impl<M> Channel<M> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            completed: AtomicBool::new(false),
        }
    }

    /// Returns `false` if the channel is already complete.
    pub(crate) fn register(&self, id: u64, handler: Handler<M>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.handlers.insert(id, handler);

        // Lost a race with `complete()`.
        if self.is_completed() {
            self.handlers.remove(&id);
            return false;
        }
        true
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Deliver `message` to every handler. Returns how many were called.
    pub(crate) fn emit(&self, message: &M) -> usize {
        if self.is_completed() {
            return 0;
        }

        // Snapshot first so handlers may (un)register without deadlocking a shard.
        let mut handlers: Vec<(u64, Handler<M>)> = self
            .handlers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        handlers.sort_unstable_by_key(|(id, _)| *id);

        for (_, handler) in &handlers {
            handler(message);
        }
        handlers.len()
    }

    pub(crate) fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
        self.handlers.clear();
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}
