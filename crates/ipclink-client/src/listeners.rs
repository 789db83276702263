use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tracing::{trace, warn};

/// Callback invoked with the `args` of a pushed event.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    events: HashMap<String, Vec<Listener>>,
}

/// Event name → ordered subscriber callbacks.
///
/// Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the subscribers of `event`.
    pub fn subscribe<F>(&self, event: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = event.into();
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .events
            .entry(event.clone())
            .or_default()
            .push(Listener {
                id,
                callback: Arc::new(callback),
            });
        trace!(event = %event, listener = id, "subscribed");

        Subscription {
            registry: Arc::downgrade(&self.inner),
            event,
            id,
        }
    }

    /// Drop every subscriber of `event`.
    pub fn unsubscribe_all(&self, event: &str) {
        self.lock().events.insert(event.to_string(), Vec::new());
    }

    /// Invoke the subscribers of `event` in subscription order.
    ///
    /// Works on a snapshot taken before the first callback runs, and runs the
    /// callbacks without holding the registry lock. A panicking callback is
    /// logged and skipped. Returns how many callbacks completed.
    pub fn dispatch(&self, event: &str, args: &Value) -> usize {
        let snapshot: Vec<(u64, Callback)> = match self.lock().events.get(event) {
            Some(listeners) => listeners
                .iter()
                .map(|listener| (listener.id, Arc::clone(&listener.callback)))
                .collect(),
            None => return 0,
        };

        let mut completed = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(args))) {
                Ok(()) => completed += 1,
                Err(_) => warn!(event, listener = id, "listener panicked; continuing"),
            }
        }
        completed
    }

    /// Number of subscribers for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().events.get(event).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        let mut counts: Vec<(&str, usize)> = registry
            .events
            .iter()
            .map(|(event, listeners)| (event.as_str(), listeners.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("ListenerRegistry")
            .field("events", &counts)
            .finish()
    }
}

/// Handle for one subscribed callback.
///
/// # Drop semantics
///
/// This handle does not own the callback. Dropping it leaves the callback
/// registered until [`ListenerRegistry::unsubscribe_all`] clears the event, so
/// keep the handle for as long as you may want to call
/// [`Subscription::unsubscribe`]. It holds only a weak reference to the
/// registry and never keeps it alive.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Event this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove exactly this callback. Returns `false` if it was already gone
    /// (e.g. after `unsubscribe_all`).
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(listeners) = registry.events.get_mut(&self.event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|listener| listener.id != self.id);
        before != listeners.len()
    }
}
