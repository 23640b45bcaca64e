use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

/// Callback invoked with a borrowed payload on every matching broadcast.
type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registered<P> {
    id: String,
    callback: Callback<P>,
}

/// Maps subscriber ids to callbacks and dispatches payloads to them.
///
/// The registry is deliberately independent of any particular store: it is
/// generic over the payload type, and the same registry type serves every
/// store instance. Dispatch walks subscribers in registration order.
///
/// Callbacks are invoked on a snapshot of the subscriber list taken outside
/// the registry lock, so a callback may call [`register`] or [`unregister`]
/// without deadlocking. A subscriber added or removed mid-broadcast does not
/// affect the broadcast already in flight.
///
/// Each invocation is isolated: a panicking callback is caught and logged,
/// and the remaining subscribers are still notified.
///
/// [`register`]: Self::register
/// [`unregister`]: Self::unregister
pub struct BroadcastRegistry<P> {
    subscribers: RwLock<Vec<Registered<P>>>,
}

impl<P> BroadcastRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Registers `callback` under `id`.
    ///
    /// An id holds at most one callback. Re-registering an id replaces the
    /// previous callback in place; the id keeps its position in dispatch
    /// order.
    pub fn register<F>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = id.into();
        let callback: Callback<P> = Arc::new(callback);
        let mut subscribers = self.write_subscribers();

        if let Some(existing) = subscribers.iter_mut().find(|entry| entry.id == id) {
            existing.callback = callback;
        } else {
            subscribers.push(Registered { id, callback });
        }
    }

    /// Removes the registration for `id`.
    ///
    /// Returns whether a registration existed.
    pub fn unregister(&self, id: &str) -> bool {
        let mut subscribers = self.write_subscribers();
        let before = subscribers.len();
        subscribers.retain(|entry| entry.id != id);
        subscribers.len() != before
    }

    /// Delivers `payload` to every registered subscriber.
    pub fn broadcast(&self, payload: &P) {
        self.broadcast_except(&[], payload);
    }

    /// Delivers `payload` to every subscriber whose id is not in `excluded`.
    ///
    /// # Arguments
    /// * `excluded` - Subscriber ids to skip for this broadcast
    /// * `payload` - The value to deliver
    pub fn broadcast_except(&self, excluded: &[&str], payload: &P) {
        let snapshot: Vec<(String, Callback<P>)> = {
            let subscribers = self.read_subscribers();
            subscribers
                .iter()
                .filter(|entry| !excluded.contains(&entry.id.as_str()))
                .map(|entry| (entry.id.clone(), Arc::clone(&entry.callback)))
                .collect()
        };

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                warn!(subscriber = %id, "subscriber callback panicked during broadcast");
            }
        }
    }

    /// Whether `id` currently holds a registration.
    pub fn contains(&self, id: &str) -> bool {
        self.read_subscribers().iter().any(|entry| entry.id == id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.read_subscribers().len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_subscribers(&self) -> std::sync::RwLockReadGuard<'_, Vec<Registered<P>>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_subscribers(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Registered<P>>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Default for BroadcastRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for BroadcastRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}
