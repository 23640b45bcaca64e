//! Signalmap - reactive key-value store with change broadcasting.
//!
//! A [`SignalMap`] holds an in-memory mapping from keys to values and emits
//! a structured [`ChangeRecord`] to every registered subscriber on each
//! mutation, so independent observers stay synchronized with shared state
//! without polling. The main features include:
//!
//! - Atomic single-key writes that commit, then broadcast old/new values
//! - Conditional writers (`insert`/`update`/`delete`) signaling via `bool`
//! - Echo suppression through `*_except` writer variants
//! - Channel-backed watch subscriptions and read-only map views
//!
//! # Quick Start
//!
//! ```rust
//! use signalmap::SignalMap;
//!
//! // Keys are stored under a caller-supplied string encoding.
//! let map: SignalMap<String, i64> = SignalMap::with_string_keys();
//!
//! map.subscribe("logger", |key, record| {
//!     println!("{key}: {record:?}");
//! });
//!
//! assert!(map.insert("hits".to_string(), 1));
//! assert!(map.update(&"hits".to_string(), |n| n + 1));
//! assert_eq!(map.get(&"hits".to_string()), Some(2));
//! ```

/// Subscriber registry with full and exclusion-filtered dispatch.
pub mod broadcast;

/// Change records describing single-key mutations.
pub mod changes;

/// String encoding of map keys.
pub mod keys;

/// Read-only views of a map.
pub mod reader;

/// The reactive map itself.
pub mod store;

/// Channel-backed subscriptions.
pub mod watch;

#[cfg(test)]
mod tests;

pub use broadcast::BroadcastRegistry;
pub use changes::ChangeRecord;
pub use keys::KeyCodec;
pub use reader::SignalMapReader;
pub use store::SignalMap;
pub use watch::Subscription;
