// Copyright (c) 2025-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The in-memory write buffer backing recent, not-yet-compacted writes.

use crate::slice::Slice;
use crossbeam_skiplist::SkipMap;

/// Writes accepted since the last compaction.
///
/// A later write to the same key shadows an earlier one. Because a skip map
/// already keyed by `key` collapses repeated writes to a single slot, "last
/// write wins" falls out of a plain `insert` rather than requiring a
/// newest-to-oldest scan over a log of writes.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    entries: SkipMap<u64, Slice>,
}

impl WriteBuffer {
    /// Creates an empty write buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write, shadowing any prior value for `key`.
    pub fn insert(&self, key: u64, value: Slice) {
        self.entries.insert(key, value);
    }

    /// Looks up the most recent value written for `key`.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<Slice> {
        self.entries.get(&key).map(|entry| entry.value().clone())
    }

    /// Returns `true` if no writes have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Slice)> + '_ {
        self.entries.iter().map(|entry| (*entry.key(), entry.value().clone()))
    }
}
