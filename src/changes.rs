/// Describes one committed mutation of a single key.
///
/// A record is produced by every successful write to a [`SignalMap`] and
/// delivered to subscribers together with the key it belongs to. It captures
/// the old and new values as applicable, so an observer can react to the
/// transition without re-reading the store.
///
/// Records are never handed back to the writer; the conditional writers
/// signal their outcome with a `bool` instead.
///
/// [`SignalMap`]: crate::SignalMap
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord<V> {
    /// The key had no entry before and now holds `new_value`.
    Insert {
        /// Value stored under the key by this write.
        new_value: V,
    },
    /// The key held `old_value` and now holds `new_value`.
    Update {
        /// Value the key held before this write.
        old_value: V,
        /// Value stored under the key by this write.
        new_value: V,
    },
    /// The key held `old_value` and now has no entry.
    Delete {
        /// Value the key held before it was removed.
        old_value: V,
    },
}

impl<V> ChangeRecord<V> {
    /// The value the key held before the mutation, if it existed.
    pub fn old_value(&self) -> Option<&V> {
        match self {
            Self::Insert { .. } => None,
            Self::Update { old_value, .. } | Self::Delete { old_value } => Some(old_value),
        }
    }

    /// The value the key holds after the mutation, if it still has one.
    pub fn new_value(&self) -> Option<&V> {
        match self {
            Self::Insert { new_value } | Self::Update { new_value, .. } => Some(new_value),
            Self::Delete { .. } => None,
        }
    }

    /// Whether this record describes a first-time insertion.
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert { .. })
    }

    /// Whether this record describes an overwrite of an existing entry.
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update { .. })
    }

    /// Whether this record describes a removal.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}
