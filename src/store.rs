use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::broadcast::BroadcastRegistry;
use crate::changes::ChangeRecord;
use crate::keys::KeyCodec;
use crate::reader::SignalMapReader;
use crate::watch::Subscription;

/// What the registry delivers to subscribers: the key that changed and the
/// record describing how.
pub(crate) type Payload<K, V> = (K, ChangeRecord<V>);

/// State shared between a [`SignalMap`], its readers, and its subscriptions.
pub(crate) struct MapInner<K, V> {
    keys: KeyCodec<K>,
    entries: RwLock<HashMap<String, V>>,
    registry: Arc<BroadcastRegistry<Payload<K, V>>>,
    /// Serializes every read-check-commit-broadcast span. Held across the
    /// broadcast so notification order matches write order.
    write_gate: Mutex<()>,
    watch_seq: AtomicUsize,
}

impl<K, V> MapInner<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let raw = self.keys.encode(key);
        self.read_entries().get(&raw).cloned()
    }

    pub(crate) fn get_all(&self) -> Vec<(K, V)> {
        self.read_entries()
            .iter()
            .map(|(raw, value)| (self.keys.decode(raw), value.clone()))
            .collect()
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        let raw = self.keys.encode(key);
        self.read_entries().contains_key(&raw)
    }

    pub(crate) fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub(crate) fn subscribe<F>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn(&K, &ChangeRecord<V>) + Send + Sync + 'static,
    {
        self.registry
            .register(id, move |(key, record): &Payload<K, V>| callback(key, record));
    }

    pub(crate) fn unsubscribe(&self, id: &str) -> bool {
        self.registry.unregister(id)
    }

    pub(crate) fn watch(&self) -> Subscription<K, V> {
        let seq = self.watch_seq.fetch_add(1, Ordering::Relaxed);
        self.watch_as(format!("watch-{seq}"))
    }

    pub(crate) fn watch_as(&self, id: impl Into<String>) -> Subscription<K, V> {
        Subscription::open(&self.registry, id.into())
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A shared key-value store that broadcasts a [`ChangeRecord`] on every
/// mutation.
///
/// Entries are kept under the string encoding of their key, supplied as an
/// encode/decode pair at construction. Every write reads the current entry,
/// commits the new state, and then delivers `(key, record)` to all
/// subscribers, or to all except a caller-named set, so a component that
/// triggered the write can skip its own echo.
///
/// The handle is cheap to clone; clones share the same entries and the same
/// subscriber registry. Reads only take a read lock, while writes are
/// serialized by a single writer gate held across the commit and the
/// broadcast, which keeps notification order equal to write order.
///
/// Synchronous subscriber callbacks run inside the writing call. A callback
/// must not write into the same map (it would deadlock on the writer gate);
/// components that react to changes by writing back should consume a
/// [`watch`] subscription from their own task and use the `*_except` writers
/// with their subscription id.
///
/// [`watch`]: Self::watch
pub struct SignalMap<K, V> {
    inner: Arc<MapInner<K, V>>,
}

impl<K, V> SignalMap<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty map from an encode/decode key pair.
    ///
    /// `decode` must invert `encode` for every key put into the map; the
    /// keys reported by [`get_all`] are produced through it.
    ///
    /// [`get_all`]: Self::get_all
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&K) -> String + Send + Sync + 'static,
        D: Fn(&str) -> K + Send + Sync + 'static,
    {
        Self::with_codec(KeyCodec::new(encode, decode))
    }

    /// Creates an empty map from an already-built [`KeyCodec`].
    pub fn with_codec(keys: KeyCodec<K>) -> Self {
        Self {
            inner: Arc::new(MapInner {
                keys,
                entries: RwLock::new(HashMap::new()),
                registry: Arc::new(BroadcastRegistry::new()),
                write_gate: Mutex::new(()),
                watch_seq: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the value stored under `key`, if any. Never broadcasts.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Returns every `(key, value)` pair currently stored.
    ///
    /// Keys are recovered from their stored string form through the decode
    /// function. The order of the returned pairs is unspecified.
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

    /// Unconditionally stores `value` under `key` and broadcasts the change.
    ///
    /// Broadcasts [`ChangeRecord::Insert`] if the key had no entry, or
    /// [`ChangeRecord::Update`] carrying the prior value. This is the only
    /// writer that always commits and always broadcasts.
    pub fn assign(&self, key: K, value: V) {
        self.assign_except(&[], key, value);
    }

    /// Like [`assign`], but the broadcast skips the subscribers in `excluded`.
    ///
    /// [`assign`]: Self::assign
    pub fn assign_except(&self, excluded: &[&str], key: K, value: V) {
        let raw = self.inner.keys.encode(&key);
        let _gate = self.inner.lock_gate();

        let old_value = {
            let mut entries = self.inner.write_entries();
            entries.insert(raw, value.clone())
        };

        let record = match old_value {
            Some(old_value) => ChangeRecord::Update {
                old_value,
                new_value: value,
            },
            None => ChangeRecord::Insert { new_value: value },
        };

        self.inner.registry.broadcast_except(excluded, &(key, record));
    }

    /// Stores `value` under `key` only if the key has no entry.
    ///
    /// Returns `true` and broadcasts [`ChangeRecord::Insert`] on success.
    /// Returns `false` without committing or broadcasting if the key already
    /// exists.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.insert_except(&[], key, value)
    }

    /// Like [`insert`], but the broadcast skips the subscribers in `excluded`.
    ///
    /// [`insert`]: Self::insert
    pub fn insert_except(&self, excluded: &[&str], key: K, value: V) -> bool {
        let raw = self.inner.keys.encode(&key);
        let _gate = self.inner.lock_gate();

        {
            let mut entries = self.inner.write_entries();
            if entries.contains_key(&raw) {
                return false;
            }
            entries.insert(raw, value.clone());
        }

        self.inner
            .registry
            .broadcast_except(excluded, &(key, ChangeRecord::Insert { new_value: value }));
        true
    }

    /// Replaces the value under `key` with `f(current)` only if the key has
    /// an entry.
    ///
    /// Returns `true` and broadcasts [`ChangeRecord::Update`] with the old
    /// and new values on success. Returns `false` without calling `f`,
    /// committing, or broadcasting if the key is absent.
    pub fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&V) -> V,
    {
        self.update_except(&[], key, f)
    }

    /// Like [`update`], but the broadcast skips the subscribers in `excluded`.
    ///
    /// [`update`]: Self::update
    pub fn update_except<F>(&self, excluded: &[&str], key: &K, f: F) -> bool
    where
        F: FnOnce(&V) -> V,
    {
        let raw = self.inner.keys.encode(key);
        let _gate = self.inner.lock_gate();

        let old_value = {
            let entries = self.inner.read_entries();
            entries.get(&raw).cloned()
        };
        let Some(old_value) = old_value else {
            return false;
        };

        let new_value = f(&old_value);
        {
            let mut entries = self.inner.write_entries();
            entries.insert(raw, new_value.clone());
        }

        self.inner.registry.broadcast_except(
            excluded,
            &(
                key.clone(),
                ChangeRecord::Update {
                    old_value,
                    new_value,
                },
            ),
        );
        true
    }

    /// Removes the entry under `key` if one exists.
    ///
    /// Returns `true` and broadcasts [`ChangeRecord::Delete`] with the
    /// removed value on success. Returns `false` without broadcasting if the
    /// key is absent.
    pub fn delete(&self, key: &K) -> bool {
        self.delete_except(&[], key)
    }

    /// Like [`delete`], but the broadcast skips the subscribers in `excluded`.
    ///
    /// [`delete`]: Self::delete
    pub fn delete_except(&self, excluded: &[&str], key: &K) -> bool {
        let raw = self.inner.keys.encode(key);
        let _gate = self.inner.lock_gate();

        let removed = {
            let mut entries = self.inner.write_entries();
            entries.remove(&raw)
        };
        let Some(old_value) = removed else {
            return false;
        };

        self.inner
            .registry
            .broadcast_except(excluded, &(key.clone(), ChangeRecord::Delete { old_value }));
        true
    }

    /// Registers `callback` under `id` with the broadcast registry.
    ///
    /// The callback receives every future `(key, record)` pair produced by
    /// any write to this map, regardless of which key changed. Registering
    /// an id that is already taken replaces its callback.
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
    ///
    /// Naming the id lets the consumer pass it to the `*_except` writers so
    /// its own writes do not come back through the subscription.
    pub fn watch_as(&self, id: impl Into<String>) -> Subscription<K, V> {
        self.inner.watch_as(id)
    }

    /// Narrows this handle to a read-only view of the same map.
    pub fn reader(&self) -> SignalMapReader<K, V> {
        SignalMapReader::new(Arc::clone(&self.inner))
    }
}

impl<V> SignalMap<String, V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty map with the identity codec for string keys.
    pub fn with_string_keys() -> Self {
        Self::with_codec(KeyCodec::string())
    }
}

impl<K, V> Clone for SignalMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> std::fmt::Debug for SignalMap<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalMap")
            .field("entries", &self.inner.len())
            .field("subscribers", &self.inner.registry.len())
            .finish()
    }
}
