use std::sync::Arc;

/// Bijective string encoding for map keys.
///
/// The store keeps its entries keyed by the encoded string form, which is
/// what gives arbitrary key types map semantics. Both functions are supplied
/// at construction and must round-trip: `decode(encode(key))` has to produce
/// a key equal to the original for every key put into the map, because
/// [`SignalMap::get_all`] reports keys back through `decode`.
///
/// [`SignalMap::get_all`]: crate::SignalMap::get_all
#[derive(Clone)]
pub struct KeyCodec<K> {
    encode: Arc<dyn Fn(&K) -> String + Send + Sync>,
    decode: Arc<dyn Fn(&str) -> K + Send + Sync>,
}

impl<K> KeyCodec<K> {
    /// Creates a codec from an encode/decode pair.
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&K) -> String + Send + Sync + 'static,
        D: Fn(&str) -> K + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// Encodes `key` into its string form.
    pub fn encode(&self, key: &K) -> String {
        (self.encode)(key)
    }

    /// Decodes a string previously produced by [`encode`] back into a key.
    ///
    /// [`encode`]: Self::encode
    pub fn decode(&self, raw: &str) -> K {
        (self.decode)(raw)
    }
}

impl KeyCodec<String> {
    /// The identity codec for maps that already use string keys.
    pub fn string() -> Self {
        Self::new(Clone::clone, str::to_owned)
    }
}

impl<K> std::fmt::Debug for KeyCodec<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCodec").finish_non_exhaustive()
    }
}
