//! Subject - a value cell that replays its current value to subscribers
//!
//! Both the scheduler's task list and every individual task publish through a
//! `Subject`. A subscriber receives the current value immediately, then every
//! later publication, in publication order. Each listener only ever sees
//! strictly newer versions, so a replay racing with a publication from another
//! thread is dropped rather than delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

/// Callback registered on a subject
pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Lifecycle of a subject's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting publications
    Open,
    /// Closed normally after a final value
    Completed,
    /// Closed by force, without a final value
    Aborted,
}

impl StreamState {
    pub fn is_closed(self) -> bool {
        !matches!(self, StreamState::Open)
    }
}

struct Entry<S> {
    id: u64,
    listener: Listener<S>,
    seen: AtomicU64,
}

impl<S> Entry<S> {
    fn deliver(&self, version: u64, value: &S) {
        if self.seen.fetch_max(version, Ordering::SeqCst) < version {
            (self.listener)(value);
        }
    }
}

struct Shared<S> {
    value: S,
    version: u64,
    state: StreamState,
    next_id: u64,
    entries: Vec<Arc<Entry<S>>>,
}

/// Observable value cell with replay-on-subscribe semantics
pub struct Subject<S> {
    shared: Arc<Mutex<Shared<S>>>,
}

impl<S> Clone for Subject<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> std::fmt::Debug for Subject<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("Subject")
            .field("version", &shared.version)
            .field("state", &shared.state)
            .field("listeners", &shared.entries.len())
            .finish()
    }
}

fn lock<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S> Subject<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create an open subject holding `initial`
    pub fn new(initial: S) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                value: initial,
                version: 1,
                state: StreamState::Open,
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Current value
    pub fn value(&self) -> S {
        lock(&self.shared).value.clone()
    }

    /// Current stream state
    pub fn state(&self) -> StreamState {
        lock(&self.shared).state
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.shared).entries.len()
    }

    /// Register a listener and replay the current value to it
    ///
    /// A closed subject replays its final value and keeps nothing registered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let listener: Listener<S> = Arc::new(listener);
        let (entry, version, value) = {
            let mut shared = lock(&self.shared);
            let id = shared.next_id;
            shared.next_id += 1;
            let entry = Arc::new(Entry {
                id,
                listener,
                seen: AtomicU64::new(0),
            });
            if !shared.state.is_closed() {
                shared.entries.push(Arc::clone(&entry));
            }
            (entry, shared.version, shared.value.clone())
        };
        debug!(listener_id = entry.id, version, "Subject::subscribe: replaying current value");
        entry.deliver(version, &value);

        let weak: Weak<Mutex<Shared<S>>> = Arc::downgrade(&self.shared);
        let id = entry.id;
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                lock(&shared).entries.retain(|e| e.id != id);
            }
        })
    }

    /// Replace the value and notify every listener
    ///
    /// Returns false if the stream is already closed.
    pub fn publish(&self, value: S) -> bool {
        let (entries, version) = {
            let mut shared = lock(&self.shared);
            if shared.state.is_closed() {
                return false;
            }
            shared.value = value.clone();
            shared.version += 1;
            (shared.entries.clone(), shared.version)
        };
        for entry in &entries {
            entry.deliver(version, &value);
        }
        true
    }

    /// Close the stream normally; the current value becomes final
    pub fn complete(&self) -> bool {
        self.close(StreamState::Completed)
    }

    /// Close the stream by force
    pub fn abort(&self) -> bool {
        self.close(StreamState::Aborted)
    }

    fn close(&self, state: StreamState) -> bool {
        let mut shared = lock(&self.shared);
        if shared.state.is_closed() {
            return false;
        }
        shared.state = state;
        shared.entries.clear();
        true
    }
}

/// Handle returned by `subscribe`; dropping it keeps the listener registered
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener from its subject
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
