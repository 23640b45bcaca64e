//! Unit tests for the map, registry, and key codec.
//! No filesystem, timing, or external dependencies.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{BroadcastRegistry, ChangeRecord, KeyCodec, SignalMap};


fn int_map() -> SignalMap<i64, String> {
    SignalMap::new(ToString::to_string, |raw| {
        raw.parse().expect("stored keys round-trip through encode")
    })
}

/// Subscribes under `id` and returns the log of records delivered to it.
fn record_log(map: &SignalMap<i64, String>, id: &str) -> Arc<Mutex<Vec<(i64, ChangeRecord<String>)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    map.subscribe(id, move |key, record| {
        sink.lock().unwrap().push((*key, record.clone()));
    });
    log
}

#[test]
fn get_returns_none_for_absent_key() {
    let map = int_map();

    assert_eq!(map.get(&7), None);

    map.assign(1, "one".to_string());
    assert_eq!(map.get(&7), None);
}

#[test]
fn insert_commits_and_broadcasts_when_absent() {
    let map = int_map();
    let log = record_log(&map, "probe");

    assert!(map.insert(1, "a".to_string()));

    assert_eq!(map.get(&1), Some("a".to_string()));
    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[(
            1,
            ChangeRecord::Insert {
                new_value: "a".to_string()
            }
        )]
    );
}

#[test]
fn insert_is_a_no_op_when_present() {
    let map = int_map();
    map.assign(1, "a".to_string());

    let log = record_log(&map, "probe");
    assert!(!map.insert(1, "b".to_string()));

    assert_eq!(map.get(&1), Some("a".to_string()));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn update_applies_function_to_current_value() {
    let map = int_map();
    map.assign(1, "a".to_string());

    let log = record_log(&map, "probe");
    assert!(map.update(&1, |old| format!("{old}b")));

    assert_eq!(map.get(&1), Some("ab".to_string()));
    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[(
            1,
            ChangeRecord::Update {
                old_value: "a".to_string(),
                new_value: "ab".to_string()
            }
        )]
    );
}

#[test]
fn update_is_a_no_op_when_absent() {
    let map = int_map();
    let log = record_log(&map, "probe");

    assert!(!map.update(&1, |old| format!("{old}b")));

    assert_eq!(map.get(&1), None);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn delete_removes_and_broadcasts_prior_value() {
    let map = int_map();
    map.assign(1, "a".to_string());

    let log = record_log(&map, "probe");
    assert!(map.delete(&1));

    assert_eq!(map.get(&1), None);
    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[(
            1,
            ChangeRecord::Delete {
                old_value: "a".to_string()
            }
        )]
    );

    assert!(!map.delete(&1));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn assign_broadcasts_on_every_call() {
    let map = int_map();
    let log = record_log(&map, "probe");

    map.assign(1, "a".to_string());
    map.assign(1, "a".to_string());
    map.assign(1, "a".to_string());

    // State converges, but each call still notifies once.
    assert_eq!(map.get(&1), Some("a".to_string()));
    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[
            (
                1,
                ChangeRecord::Insert {
                    new_value: "a".to_string()
                }
            ),
            (
                1,
                ChangeRecord::Update {
                    old_value: "a".to_string(),
                    new_value: "a".to_string()
                }
            ),
            (
                1,
                ChangeRecord::Update {
                    old_value: "a".to_string(),
                    new_value: "a".to_string()
                }
            ),
        ]
    );
}

#[test]
fn unsubscribe_stops_delivery_and_reports_existence() {
    let map = int_map();
    let log = record_log(&map, "probe");

    map.assign(1, "a".to_string());
    assert!(map.unsubscribe("probe"));

    map.assign(2, "b".to_string());
    assert_eq!(log.lock().unwrap().len(), 1);

    assert!(!map.unsubscribe("probe"));
}

#[test]
fn get_all_round_trips_keys_through_codec() {
    let map = int_map();
    map.assign(1, "one".to_string());
    map.assign(2, "two".to_string());
    map.assign(3, "three".to_string());
    map.delete(&2);

    let mut all = map.get_all();
    all.sort_by_key(|(key, _)| *key);

    assert_eq!(
        all,
        vec![(1, "one".to_string()), (3, "three".to_string())]
    );
}

#[test]
fn lifecycle_scenario_with_integer_keys() {
    let map = int_map();
    let log = record_log(&map, "probe");

    assert!(map.insert(1, "a".to_string()));
    map.assign(1, "b".to_string());
    assert!(map.delete(&1));
    assert_eq!(map.get(&1), None);

    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[
            (
                1,
                ChangeRecord::Insert {
                    new_value: "a".to_string()
                }
            ),
            (
                1,
                ChangeRecord::Update {
                    old_value: "a".to_string(),
                    new_value: "b".to_string()
                }
            ),
            (
                1,
                ChangeRecord::Delete {
                    old_value: "b".to_string()
                }
            ),
        ]
    );
}

#[test]
fn len_and_contains_key_track_entries() {
    let map = int_map();
    assert!(map.is_empty());

    map.assign(1, "a".to_string());
    map.assign(2, "b".to_string());

    assert_eq!(map.len(), 2);
    assert!(map.contains_key(&1));
    assert!(!map.contains_key(&3));

    map.delete(&1);
    assert_eq!(map.len(), 1);
    assert!(!map.contains_key(&1));
}

#[test]
fn clones_share_entries_and_subscribers() {
    let map = int_map();
    let other = map.clone();
    let log = record_log(&map, "probe");

    other.assign(1, "a".to_string());

    assert_eq!(map.get(&1), Some("a".to_string()));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn string_codec_is_identity() {
    let codec = KeyCodec::string();

    assert_eq!(codec.encode(&"alpha".to_string()), "alpha");
    assert_eq!(codec.decode("alpha"), "alpha");
}

#[test]
fn custom_codec_round_trips() {
    let codec = KeyCodec::new(
        |key: &(u8, u8)| format!("{}:{}", key.0, key.1),
        |raw| {
            let (a, b) = raw.split_once(':').expect("encoded pair");
            (a.parse().unwrap(), b.parse().unwrap())
        },
    );

    let raw = codec.encode(&(3, 9));
    assert_eq!(codec.decode(&raw), (3, 9));
}

#[test]
fn registry_broadcasts_in_registration_order() {
    let registry: BroadcastRegistry<u32> = BroadcastRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let seen = Arc::clone(&order);
        registry.register(name, move |_payload| {
            seen.lock().unwrap().push(name);
        });
    }

    registry.broadcast(&0);
    assert_eq!(order.lock().unwrap().as_slice(), &["first", "second", "third"]);
}

#[test]
fn registry_broadcast_except_skips_listed_ids() {
    let registry: BroadcastRegistry<u32> = BroadcastRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    for name in ["keep", "skip-a", "skip-b"] {
        let counter = Arc::clone(&hits);
        registry.register(name, move |_payload| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    registry.broadcast_except(&["skip-a", "skip-b"], &0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    registry.broadcast_except(&[], &0);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[test]
fn registry_reregistration_replaces_callback() {
    let registry: BroadcastRegistry<u32> = BroadcastRegistry::new();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&first);
    registry.register("sub", move |_payload| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&second);
    registry.register("sub", move |_payload| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    registry.broadcast(&0);

    assert_eq!(registry.len(), 1);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn registry_unregister_reports_existence() {
    let registry: BroadcastRegistry<u32> = BroadcastRegistry::new();
    registry.register("sub", |_payload| {});

    assert!(registry.contains("sub"));
    assert!(registry.unregister("sub"));
    assert!(!registry.unregister("sub"));
    assert!(registry.is_empty());
}

#[test]
fn registry_isolates_panicking_subscriber() {
    let registry: BroadcastRegistry<u32> = BroadcastRegistry::new();
    let delivered = Arc::new(AtomicUsize::new(0));

    registry.register("bomb", |_payload| panic!("subscriber failure"));
    let counter = Arc::clone(&delivered);
    registry.register("after", move |_payload| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    registry.broadcast(&0);
    registry.broadcast(&1);

    // The panicking subscriber never prevents later ones from being notified.
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[test]
fn registry_callback_may_unregister_during_broadcast() {
    let registry: Arc<BroadcastRegistry<u32>> = Arc::new(BroadcastRegistry::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let inner = Arc::clone(&registry);
    let counter = Arc::clone(&hits);
    registry.register("once", move |_payload| {
        counter.fetch_add(1, Ordering::SeqCst);
        inner.unregister("once");
    });

    registry.broadcast(&0);
    registry.broadcast(&1);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty());
}

#[test]
fn reader_sees_writes_but_exposes_no_writers() {
    let map = int_map();
    let reader = map.reader();

    map.assign(1, "a".to_string());

    assert_eq!(reader.get(&1), Some("a".to_string()));
    assert_eq!(reader.len(), 1);
    assert!(reader.contains_key(&1));
    assert!(!reader.is_empty());

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    reader.subscribe("reader-probe", move |key: &i64, record: &ChangeRecord<String>| {
        sink.lock().unwrap().push((*key, record.clone()));
    });

    map.delete(&1);
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(reader.unsubscribe("reader-probe"));
}
