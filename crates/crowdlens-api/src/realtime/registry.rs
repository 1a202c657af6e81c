// Subscriber registry
//
// Listeners are kept per event name in insertion order. The registry is
// owned by the channel, not by a connection, so registrations outlive
// transport reconnects.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

/// Callback invoked with the first argument of a pushed event.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Registry {
    listeners: DashMap<String, IndexMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn register(self: &Arc<Self>, event: &str, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(event.to_owned())
            .or_default()
            .insert(id, listener);
        debug!(event, id, "listener registered");

        Subscription {
            event: event.to_owned(),
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub(crate) fn remove(&self, event: &str, id: u64) -> bool {
        let Some(mut entry) = self.listeners.get_mut(event) else {
            return false;
        };
        let removed = entry.shift_remove(&id).is_some();
        let now_empty = entry.is_empty();
        drop(entry);

        if now_empty {
            self.listeners.remove_if(event, |_, listeners| listeners.is_empty());
        }
        if removed {
            debug!(event, id, "listener removed");
        }
        removed
    }

    /// Invoke every listener of `event`, in registration order.
    ///
    /// Listeners are cloned out of the map first, so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub(crate) fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let listeners: Vec<Listener> = match self.listeners.get(event) {
            Some(entry) => entry.values().cloned().collect(),
            None => {
                trace!(event, "no listeners for event");
                return 0;
            }
        };

        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    pub(crate) fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, |entry| entry.len())
    }

    pub(crate) fn clear(&self) {
        self.listeners.clear();
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle to one registered listener.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// removes exactly this registration. Other listeners of the same event
/// are unaffected.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    event: String,
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// The event name this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the registration now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the listener is still registered with a live channel.
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .listeners
                .get(&self.event)
                .is_some_and(|entry| entry.contains_key(&self.id))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
