//! Behavioural tests for the bounded LRU cache.
//!
//! Covers the documented eviction scenarios, the on-disk layout and the
//! index/queue invariant under concurrent access.

// Integration tests can use unwrap/expect for cleaner assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use resizer_cache::{BoundedCache, DurableStore};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn new_cache(capacity: usize) -> (TempDir, BoundedCache) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let store = DurableStore::new(temp.path()).expect("Failed to open store");
    let cache = BoundedCache::new(capacity, store).expect("Failed to create cache");
    (temp, cache)
}

// =============================================================================
// Eviction scenarios
// =============================================================================

#[test]
fn test_simple_eviction_with_small_capacity() {
    let (_temp, cache) = new_cache(2);

    assert!(cache.get("key1").is_none());
    assert!(cache.get("key2").is_none());

    cache.set("key1", b"value1").unwrap();
    assert_eq!(cache.get("key1").unwrap(), b"value1");

    cache.set("key2", b"value2").unwrap();
    assert_eq!(cache.get("key2").unwrap(), b"value2");

    // key1 was touched before key2, so it is the eviction candidate
    cache.set("key3", b"value3").unwrap();
    assert!(cache.get("key1").is_none());
    assert!(cache.get("key2").is_some());
    assert!(cache.get("key3").is_some());
}

#[test]
fn test_capacity_overflow_evicts_first_inserted() {
    let (_temp, cache) = new_cache(3);
    cache.set("a", b"1").unwrap();
    cache.set("b", b"2").unwrap();
    cache.set("c", b"3").unwrap();
    cache.set("d", b"4").unwrap();

    assert!(cache.get("a").is_none());
    assert!(cache.get("b").is_some());
    assert!(cache.get("c").is_some());
    assert!(cache.get("d").is_some());
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_touched_entries_survive_eviction() {
    let (_temp, cache) = new_cache(3);
    cache.set("a", b"1").unwrap();
    cache.set("b", b"2").unwrap();
    cache.set("c", b"3").unwrap();

    assert!(cache.get("a").is_some());
    assert!(cache.get("b").is_some());
    cache.set("d", b"4").unwrap();

    assert!(cache.get("c").is_none());
    assert!(cache.get("a").is_some());
    assert!(cache.get("b").is_some());
    assert!(cache.get("d").is_some());
}

#[test]
fn test_mixed_updates_and_reads_decide_eviction() {
    let (_temp, cache) = new_cache(3);
    cache.set("key1", b"value1").unwrap();
    cache.set("key2", b"value2").unwrap();
    cache.set("key3", b"value3").unwrap();

    assert!(cache.get("key1").is_some());
    assert!(cache.get("key2").is_some());

    cache.set("key1", b"value4").unwrap();
    cache.set("key2", b"value5").unwrap();
    cache.get("key1");
    cache.get("key2");
    cache.set("key1", b"value6").unwrap();
    cache.get("key1");

    cache.set("key4", b"value7").unwrap();

    assert_eq!(cache.get("key1").unwrap(), b"value6");
    assert_eq!(cache.get("key2").unwrap(), b"value5");
    assert!(cache.get("key3").is_none());
    assert_eq!(cache.get("key4").unwrap(), b"value7");
}

#[test]
fn test_round_trip_for_many_keys() {
    let (_temp, cache) = new_cache(64);
    for i in 0..64 {
        cache.set(&format!("k{i}"), format!("v{i}").as_bytes()).unwrap();
    }
    for i in 0..64 {
        assert_eq!(cache.get(&format!("k{i}")).unwrap(), format!("v{i}").as_bytes());
    }
}

// =============================================================================
// Disk layout
// =============================================================================

#[test]
fn test_payload_file_lives_under_cache_dir() {
    let (temp, cache) = new_cache(2);
    cache.set("key1", b"value1").unwrap();

    let file = temp.path().join("key1");
    assert!(file.exists(), "expected {} to exist", file.display());
    assert_eq!(cache.get("key1").unwrap(), b"value1");
}

#[test]
fn test_externally_removed_file_reads_as_miss() {
    let (temp, cache) = new_cache(2);
    cache.set("key1", b"value1").unwrap();
    std::fs::remove_file(temp.path().join("key1")).unwrap();

    assert!(cache.get("key1").is_none());
}

#[test]
fn test_clear_forgets_every_key() {
    let (_temp, cache) = new_cache(5);
    for key in ["a", "b", "c"] {
        cache.set(key, key.as_bytes()).unwrap();
    }
    cache.clear();
    for key in ["a", "b", "c"] {
        assert!(cache.get(key).is_none(), "{key} should be absent after clear");
    }
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.index_len(), 0);
}

#[test]
fn test_cache_is_reusable_after_clear() {
    let (_temp, cache) = new_cache(2);
    cache.set("a", b"1").unwrap();
    cache.clear();
    cache.set("b", b"2").unwrap();
    cache.set("c", b"3").unwrap();
    cache.set("d", b"4").unwrap();

    assert_eq!(cache.keys_by_recency(), vec!["d", "c"]);
}

#[test]
fn test_warm_start_picks_up_previous_run() {
    let temp = TempDir::new().unwrap();
    {
        let cache = BoundedCache::new(4, DurableStore::new(temp.path()).unwrap()).unwrap();
        cache.set("persisted", b"still here").unwrap();
    }

    let cache = BoundedCache::open(4, DurableStore::new(temp.path()).unwrap()).unwrap();
    assert_eq!(cache.get("persisted").unwrap(), b"still here");
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_set_and_get_keep_invariants() {
    let (_temp, cache) = new_cache(10);
    let cache = Arc::new(cache);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("{t}-{i}");
                    cache.set(&key, format!("value{key}").as_bytes()).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("{}-{}", (t + i) % 4, (i * 7) % 500);
                    if let Some(value) = cache.get(&key) {
                        assert_eq!(value, format!("value{key}").into_bytes());
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().expect("worker thread panicked");
    }

    assert_eq!(cache.len(), cache.index_len());
    assert!(cache.len() <= cache.capacity());
    assert_eq!(cache.len(), 10);

    let files = cache.store().entries().unwrap();
    assert_eq!(files.len(), 10, "evicted payloads must be deleted from disk");
}

#[test]
fn test_concurrent_writes_to_same_key() {
    let (_temp, cache) = new_cache(3);
    let cache = Arc::new(cache);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..50 {
                    cache.set("shared", format!("writer{t}").as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 1);
    let value = String::from_utf8(cache.get("shared").unwrap()).unwrap();
    assert!(value.starts_with("writer"));
}
