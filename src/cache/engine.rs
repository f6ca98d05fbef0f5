// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Instant,
};

use bytes::Bytes;
use rand::RngExt;
use tracing::debug;

use crate::{cache::recency::RecencyIndex, cfg::config::CacheConfig};

/// Result of a store attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// Payload exceeds the per-value limit.
    ValueTooLarge,
    /// The value cannot fit within the total-byte limit even with the cache
    /// emptied.
    CacheFull,
}

/// One stored value: payload bytes, opaque client flags, absolute expiry.
#[derive(Debug, Clone)]
struct Record {
    data: Bytes,
    flags: u32,
    expires_at: Instant,
}

#[derive(Debug)]
struct Inner {
    store: HashMap<Bytes, Record>,
    recency: RecencyIndex,
    total_bytes: u64,
}

impl Inner {
    /// Removes the current LRU key from both maps. Returns false when the
    /// cache is already empty.
    fn evict_lru(&mut self) -> bool {
        let Some(victim) = self.recency.peek_lru().cloned() else {
            return false;
        };
        debug!(key = ?victim, "evicting LRU key");
        self.remove_entry(&victim)
    }

    fn remove_entry(&mut self, key: &Bytes) -> bool {
        match self.store.remove(key) {
            Some(record) => {
                self.total_bytes -= record.data.len() as u64;
                self.recency.remove(key);
                true
            },
            None => false,
        }
    }
}

/// The authoritative in-memory store.
///
/// One mutex guards the key map, the recency index, and the byte counter for
/// the whole duration of every operation, so each operation is linearizable.
/// Operations never block on I/O while holding the lock.
#[derive(Debug)]
pub struct Cache {
    inner: Mutex<Inner>,
    cfg: CacheConfig,
}

impl Cache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: HashMap::with_capacity(cfg.max_keys.min(1024)),
                recency: RecencyIndex::with_capacity(cfg.max_keys.min(1024)),
                total_bytes: 0,
            }),
            cfg,
        }
    }

    /// Inserts or replaces `key`. The wire `expiration` parameter is accepted
    /// but the configured default TTL is applied uniformly.
    pub fn set(
        &self,
        key: Bytes,
        data: Bytes,
        flags: u32,
        _expiration: u32,
    ) -> StoreOutcome {
        if data.len() > self.cfg.max_value_bytes {
            return StoreOutcome::ValueTooLarge;
        }

        let now = Instant::now();
        let mut inner = self.lock();

        // Replacing a key starts by detaching its old record so the insert
        // below is always a fresh one. A brand-new key at the count limit
        // costs one LRU eviction up front.
        if inner.store.contains_key(&key) {
            inner.remove_entry(&key);
        } else if inner.store.len() == self.cfg.max_keys {
            inner.evict_lru();
        }

        while inner.total_bytes + data.len() as u64 > self.cfg.max_total_bytes {
            if !inner.evict_lru() {
                return StoreOutcome::CacheFull;
            }
        }

        inner.total_bytes += data.len() as u64;
        inner.recency.insert_mru(key.clone());
        inner.store.insert(key, Record {
            data,
            flags,
            expires_at: now + self.cfg.default_ttl,
        });

        StoreOutcome::Stored
    }

    /// Looks up `key`. A hit moves the key to MRU; an entry past its expiry
    /// is removed on access and reported as a miss.
    pub fn get(&self, key: &Bytes) -> Option<(Bytes, u32)> {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = inner.store.get(key)?.expires_at <= now;
        if expired {
            inner.remove_entry(key);
            return None;
        }

        inner.recency.touch(key);
        let record = inner.store.get(key)?;
        Some((record.data.clone(), record.flags))
    }

    /// Returns true iff the key existed and was removed.
    pub fn delete(&self, key: &Bytes) -> bool {
        self.lock().remove_entry(key)
    }

    /// Samples up to `sample_size` keys starting at a random offset of the
    /// map's iteration order and deletes the expired ones. Returns how many
    /// were removed.
    pub fn sweep_expired(&self, sample_size: usize) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();

        let len = inner.store.len();
        if len == 0 || sample_size == 0 {
            return 0;
        }

        let offset = rand::rng().random_range(0..len);
        let sampled: Vec<Bytes> = inner
            .store
            .keys()
            .cycle()
            .skip(offset)
            .take(sample_size.min(len))
            .cloned()
            .collect();

        let mut removed = 0;
        for key in &sampled {
            let expired = matches!(inner.store.get(key), Some(r) if r.expires_at <= now);
            if expired && inner.remove_entry(key) {
                removed += 1;
            }
        }
        removed
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().store.is_empty()
    }

    /// Sum of payload lengths across live entries.
    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Keep serving after a panic elsewhere poisoned the lock.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
