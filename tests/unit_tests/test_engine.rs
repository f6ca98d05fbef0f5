// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use bytes::Bytes;
use memcache_server_rs::{
    cache::engine::{Cache, StoreOutcome},
    cfg::config::CacheConfig,
};

fn key(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn value(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn config(max_keys: usize, max_value_bytes: usize, max_total_bytes: u64) -> CacheConfig {
    CacheConfig {
        max_keys,
        max_key_bytes: 250,
        max_value_bytes,
        max_total_bytes,
        default_ttl: Duration::from_secs(3600),
    }
}

#[test]
fn set_then_get_round_trips() {
    let cache = Cache::new(config(16, 1024, 1 << 20));
    assert_eq!(
        cache.set(key("k"), value("hello"), 7, 0),
        StoreOutcome::Stored
    );
    assert_eq!(cache.get(&key("k")), Some((value("hello"), 7)));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.total_bytes(), 5);
}

#[test]
fn get_miss_is_none() {
    let cache = Cache::new(config(16, 1024, 1 << 20));
    assert_eq!(cache.get(&key("missing")), None);
}

#[test]
fn set_then_delete_leaves_key_absent() {
    let cache = Cache::new(config(16, 1024, 1 << 20));
    cache.set(key("k"), value("x"), 0, 0);
    assert!(cache.delete(&key("k")));
    assert!(!cache.delete(&key("k")));
    assert_eq!(cache.get(&key("k")), None);
    assert_eq!(cache.total_bytes(), 0);
}

#[test]
fn replacing_a_key_updates_total_bytes() {
    let cache = Cache::new(config(16, 1024, 1 << 20));
    cache.set(key("k"), value("short"), 0, 0);
    cache.set(key("k"), value("a much longer value"), 1, 0);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.total_bytes(), 19);
    assert_eq!(cache.get(&key("k")), Some((value("a much longer value"), 1)));
}

#[test]
fn replacing_at_max_keys_does_not_evict() {
    let cache = Cache::new(config(2, 1024, 1 << 20));
    cache.set(key("a"), value("1"), 0, 0);
    cache.set(key("b"), value("2"), 0, 0);
    // "a" is LRU but replacing "b" must not push anything out.
    assert_eq!(cache.set(key("b"), value("3"), 0, 0), StoreOutcome::Stored);
    assert!(cache.get(&key("a")).is_some());
    assert_eq!(cache.get(&key("b")), Some((value("3"), 0)));
}

#[test]
fn new_key_at_max_keys_evicts_the_lru() {
    let cache = Cache::new(config(2, 1024, 1 << 20));
    cache.set(key("a"), value("1"), 0, 0);
    cache.set(key("b"), value("2"), 0, 0);
    // Touch "a" so "b" is LRU.
    assert!(cache.get(&key("a")).is_some());

    cache.set(key("c"), value("3"), 0, 0);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("b")), None);
    assert!(cache.get(&key("a")).is_some());
    assert!(cache.get(&key("c")).is_some());
}

#[test]
fn get_promotes_key_to_mru() {
    let cache = Cache::new(config(3, 1024, 1 << 20));
    cache.set(key("a"), value("1"), 0, 0);
    cache.set(key("b"), value("2"), 0, 0);
    cache.set(key("c"), value("3"), 0, 0);

    // "a" would be next out; reading it shifts eviction onto "b".
    assert!(cache.get(&key("a")).is_some());
    cache.set(key("d"), value("4"), 0, 0);
    assert_eq!(cache.get(&key("b")), None);
    assert!(cache.get(&key("a")).is_some());
}

#[test]
fn oversized_value_is_rejected() {
    let cache = Cache::new(config(16, 4, 1 << 20));
    assert_eq!(
        cache.set(key("k"), value("12345"), 0, 0),
        StoreOutcome::ValueTooLarge
    );
    assert_eq!(cache.len(), 0);

    // Exactly at the limit is fine.
    assert_eq!(cache.set(key("k"), value("1234"), 0, 0), StoreOutcome::Stored);
}

#[test]
fn byte_limit_evicts_until_the_value_fits() {
    // Three 4-byte values fill the 12-byte cache; an 8-byte value must evict
    // two of them, LRU first.
    let cache = Cache::new(config(16, 12, 12));
    cache.set(key("a"), value("aaaa"), 0, 0);
    cache.set(key("b"), value("bbbb"), 0, 0);
    cache.set(key("c"), value("cccc"), 0, 0);
    assert_eq!(cache.total_bytes(), 12);

    assert_eq!(
        cache.set(key("d"), value("dddddddd"), 0, 0),
        StoreOutcome::Stored
    );
    assert_eq!(cache.get(&key("a")), None);
    assert_eq!(cache.get(&key("b")), None);
    assert!(cache.get(&key("c")).is_some());
    assert!(cache.get(&key("d")).is_some());
    assert_eq!(cache.total_bytes(), 12);
}

#[test]
fn value_larger_than_total_limit_errors_even_on_empty_cache() {
    let cache = Cache::new(config(16, 64, 8));
    assert_eq!(
        cache.set(key("k"), value("123456789"), 0, 0),
        StoreOutcome::CacheFull
    );
    assert!(cache.is_empty());
}

#[test]
fn zero_length_value_round_trips() {
    let cache = Cache::new(config(16, 1024, 1 << 20));
    assert_eq!(cache.set(key("k"), Bytes::new(), 9, 0), StoreOutcome::Stored);
    assert_eq!(cache.get(&key("k")), Some((Bytes::new(), 9)));
    assert_eq!(cache.total_bytes(), 0);
}

#[test]
fn expired_entry_is_removed_on_access() {
    let cfg = CacheConfig {
        default_ttl: Duration::ZERO,
        ..config(16, 1024, 1 << 20)
    };
    let cache = Cache::new(cfg);
    cache.set(key("k"), value("v"), 0, 0);
    // TTL zero expires immediately.
    assert_eq!(cache.get(&key("k")), None);
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.total_bytes(), 0);
}

#[test]
fn sweep_removes_only_expired_entries() {
    let expired = Cache::new(CacheConfig {
        default_ttl: Duration::ZERO,
        ..config(16, 1024, 1 << 20)
    });
    for i in 0..8 {
        expired.set(key(&format!("k{i}")), value("v"), 0, 0);
    }
    let mut removed = 0;
    // Sampling is random; a few rounds clear everything.
    for _ in 0..64 {
        removed += expired.sweep_expired(4);
    }
    assert_eq!(removed, 8);
    assert!(expired.is_empty());

    let live = Cache::new(config(16, 1024, 1 << 20));
    for i in 0..8 {
        live.set(key(&format!("k{i}")), value("v"), 0, 0);
    }
    assert_eq!(live.sweep_expired(8), 0);
    assert_eq!(live.len(), 8);
}

#[test]
fn sweep_of_empty_cache_is_a_noop() {
    let cache = Cache::new(config(16, 1024, 1 << 20));
    assert_eq!(cache.sweep_expired(10), 0);
}

#[test]
fn limits_hold_across_interleaved_operations() {
    let max_keys = 4;
    let max_total = 32u64;
    let cache = Cache::new(config(max_keys, 16, max_total));

    // A deterministic mix of sets, gets, and deletes; the count and byte
    // invariants must hold after every step.
    for step in 0u32..200 {
        let k = key(&format!("k{}", step % 7));
        match step % 5 {
            0 | 1 => {
                let payload = vec![b'x'; (step as usize * 3) % 17];
                let outcome =
                    cache.set(k, Bytes::copy_from_slice(&payload), step, 0);
                if payload.len() <= 16 {
                    assert_eq!(outcome, StoreOutcome::Stored);
                }
            },
            2 | 3 => {
                let _ = cache.get(&k);
            },
            _ => {
                let _ = cache.delete(&k);
            },
        }
        assert!(cache.len() <= max_keys);
        assert!(cache.total_bytes() <= max_total);
    }
}
