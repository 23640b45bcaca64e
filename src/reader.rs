use std::sync::Arc;

use crate::changes::ChangeRecord;
use crate::store::MapInner;
use crate::watch::Subscription;

/// A read-only view of a [`SignalMap`].
///
/// The reader shares the underlying entries and subscriber registry with the
/// map it was narrowed from, but its type exposes no write operation, so the
/// restriction holds at compile time. Hand one to components that should
/// observe the store without being able to mutate it.
///
/// [`SignalMap`]: crate::SignalMap
pub struct SignalMapReader<K, V> {
    inner: Arc<MapInner<K, V>>,
}

impl<K, V> SignalMapReader<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(inner: Arc<MapInner<K, V>>) -> Self {
        Self { inner }
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Returns every `(key, value)` pair currently stored, in unspecified
    /// order.
    pub fn get_all(&self) -> Vec<(K, V)> {
        self.inner.get_all()
    }

    /// Whether `key` currently has an entry.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Registers `callback` under `id`, as [`SignalMap::subscribe`] does.
    ///
    /// [`SignalMap::subscribe`]: crate::SignalMap::subscribe
    pub fn subscribe<F>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn(&K, &ChangeRecord<V>) + Send + Sync + 'static,
    {
        self.inner.subscribe(id, callback);
    }

    /// Removes the subscriber registered under `id`.
    ///
    /// Returns whether a registration existed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Opens a channel-backed subscription under a generated id.
    pub fn watch(&self) -> Subscription<K, V> {
        self.inner.watch()
    }

    /// Opens a channel-backed subscription under a caller-chosen id.
    pub fn watch_as(&self, id: impl Into<String>) -> Subscription<K, V> {
        self.inner.watch_as(id)
    }
}

impl<K, V> Clone for SignalMapReader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> std::fmt::Debug for SignalMapReader<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalMapReader")
            .field("entries", &self.inner.len())
            .finish()
    }
}
