// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use bytes::Bytes;

const NIL: usize = usize::MAX;

/// One slot in the arena. Freed slots keep their links but drop the key so
/// the payload is released immediately.
#[derive(Debug)]
struct Node {
    key: Bytes,
    prev: usize,
    next: usize,
}

/// Total recency order over live keys, most-recently-used first.
///
/// A doubly linked list threaded through a `Vec` arena (index links plus a
/// free list) with a `HashMap` from key to node handle. All operations are
/// O(1). The structure is not synchronized; the cache engine's mutex
/// serializes every access.
#[derive(Debug)]
pub struct RecencyIndex {
    nodes: Vec<Node>,
    handles: HashMap<Bytes, usize>,
    /// MRU end.
    head: usize,
    /// LRU end.
    tail: usize,
    free: Vec<usize>,
}

impl Default for RecencyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyIndex {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            handles: HashMap::new(),
            head: NIL,
            tail: NIL,
            free: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            handles: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            free: Vec::new(),
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Adds a key at the MRU position. The key must not already be tracked;
    /// callers touch existing keys instead.
    pub fn insert_mru(&mut self, key: Bytes) {
        debug_assert!(!self.handles.contains_key(&key), "key already tracked");

        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx].key = key.clone();
                idx
            },
            None => {
                self.nodes.push(Node {
                    key: key.clone(),
                    prev: NIL,
                    next: NIL,
                });
                self.nodes.len() - 1
            },
        };

        self.link_front(idx);
        self.handles.insert(key, idx);
    }

    /// Detaches a key from wherever it is. No-op if the key is not tracked.
    pub fn remove(&mut self, key: &Bytes) -> bool {
        match self.handles.remove(key) {
            Some(idx) => {
                self.unlink(idx);
                self.release(idx);
                true
            },
            None => false,
        }
    }

    /// Moves a key to the MRU position. No-op if the key is not tracked.
    pub fn touch(&mut self, key: &Bytes) -> bool {
        match self.handles.get(key) {
            Some(&idx) => {
                if self.head != idx {
                    self.unlink(idx);
                    self.link_front(idx);
                }
                true
            },
            None => false,
        }
    }

    /// Current LRU key, if any, without removing it.
    pub fn peek_lru(&self) -> Option<&Bytes> {
        if self.tail == NIL {
            return None;
        }
        Some(&self.nodes[self.tail].key)
    }

    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx].key = Bytes::new();
        self.free.push(idx);
    }
}
