//! Insertion Order Module
//!
//! Tracks the order in which keys were written to a layer so the oldest
//! insertion can be evicted when the layer is full.

use std::collections::{BTreeMap, HashMap};

// == Insertion Order ==
/// Insertion-order tracker used for capacity eviction.
///
/// Reads never reorder keys; only writes do. Overwriting a key counts as a
/// fresh insertion and moves it to the back.
///
/// Every write takes the next sequence number. `by_seq` keeps keys ordered by
/// that number (lowest = oldest) and `seq_of` maps a key back to it, so
/// removal from anywhere in the order is a logarithmic operation.
#[derive(Debug, Default)]
pub struct InsertionOrder {
    next_seq: u64,
    by_seq: BTreeMap<u64, String>,
    seq_of: HashMap<String, u64>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Insert ==
    /// Records a write of `key`, moving it to the newest position.
    pub fn record_insert(&mut self, key: &str) {
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(previous) = self.seq_of.insert(key.to_string(), seq) {
            self.by_seq.remove(&previous);
        }
        self.by_seq.insert(seq, key.to_string());
    }

    // == Remove ==
    /// Forgets a key.
    pub fn remove(&mut self, key: &str) {
        if let Some(seq) = self.seq_of.remove(key) {
            self.by_seq.remove(&seq);
        }
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest inserted key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.by_seq.pop_first()?;
        self.seq_of.remove(&key);
        Some(key)
    }

    /// Returns the oldest inserted key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.by_seq.first_key_value().map(|(_, key)| key)
    }

    /// Drops every tracked key.
    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.seq_of.clear();
    }

    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seq_of.contains_key(key)
    }
}
