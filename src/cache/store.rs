//! Cache Store Module
//!
//! One cache layer: HashMap storage with insertion-order eviction and TTL
//! expiration. Not synchronized on its own; the manager wraps each store in
//! its own lock.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{
    CacheEntry, CacheStats, CacheStatsSnapshot, InsertionOrder, LayerConfig, MAX_KEY_LENGTH,
    MAX_VALUE_SIZE,
};
use crate::clock::current_timestamp_ms;
use crate::error::{LayerError, Result};

// == Lookup ==
/// Outcome of a [`CacheStore::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Hit(T),
    /// Absent, or present but rejected by the reader
    Miss,
    /// Present but past its deadline
    Expired,
}

impl<T> Lookup<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::Expired => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Lookup::Expired)
    }
}

// == Cache Store ==
/// A single named cache layer.
#[derive(Debug)]
pub struct CacheStore {
    config: LayerConfig,
    entries: HashMap<String, CacheEntry>,
    order: InsertionOrder,
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    pub fn new(config: LayerConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            stats: CacheStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    // == Lookup ==
    /// Looks up `key` and hands the live entry to `read`.
    ///
    /// Needs only a shared borrow, so the manager serves reads under a read
    /// lock. Counts a hit only when `read` produces a value. Expired entries
    /// count as misses and stay in place until [`CacheStore::expire`] or the
    /// sweep removes them.
    pub fn lookup<T>(&self, key: &str, read: impl FnOnce(&CacheEntry) -> Option<T>) -> Lookup<T> {
        self.lookup_at(key, current_timestamp_ms(), read)
    }

    pub fn lookup_at<T>(
        &self,
        key: &str,
        now: u64,
        read: impl FnOnce(&CacheEntry) -> Option<T>,
    ) -> Lookup<T> {
        let outcome = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => match read(entry) {
                Some(value) => Lookup::Hit(value),
                None => Lookup::Miss,
            },
            Some(_) => Lookup::Expired,
            None => Lookup::Miss,
        };

        if matches!(outcome, Lookup::Hit(_)) {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        outcome
    }

    // == Expire ==
    /// Removes `key` if it is expired, returning whether it was removed.
    pub fn expire(&mut self, key: &str) -> bool {
        self.expire_at(key, current_timestamp_ms())
    }

    pub fn expire_at(&mut self, key: &str, now: u64) -> bool {
        let expired = self.entries.get(key).is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            debug!(layer = %self.config.name, key, "cache entry expired");
            self.remove_entry(key);
            self.stats.record_expirations(1);
        }
        expired
    }

    // == Get ==
    /// Returns a copy of the raw bytes stored under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lookup(key, |entry| Some(entry.value.clone())).value()
    }

    // == Set ==
    /// Stores raw bytes under `key`.
    ///
    /// Overwrites reset the TTL. A new key arriving at a full layer first
    /// evicts the oldest inserted entry.
    pub fn set(&mut self, key: String, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.set_at(key, value, ttl, current_timestamp_ms())
    }

    pub fn set_at(&mut self, key: String, value: Vec<u8>, ttl: Option<Duration>, now: u64) -> Result<()> {
        if key.is_empty() {
            return Err(LayerError::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(LayerError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(LayerError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let is_overwrite = self.entries.contains_key(&key);
        while !is_overwrite && self.entries.len() >= self.config.max_entries {
            match self.order.pop_oldest() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                    debug!(layer = %self.config.name, key = %evicted, "evicted oldest entry");
                }
                None => break,
            }
        }

        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry::new_at(key.clone(), value, self.config.name.clone(), ttl, now);
        self.order.record_insert(&key);
        self.entries.insert(key, entry);
        self.stats.record_set();

        Ok(())
    }

    // == Delete ==
    /// Removes `key`, returning how many entries were removed (0 or 1).
    pub fn delete(&mut self, key: &str) -> usize {
        let removed = usize::from(self.remove_entry(key));
        self.stats.record_deletes(removed as u64);
        removed
    }

    // == Invalidate Pattern ==
    /// Removes every key containing `pattern` as a case-sensitive substring.
    ///
    /// An empty pattern matches nothing.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> usize {
        if pattern.is_empty() {
            return 0;
        }

        let matching: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        for key in &matching {
            self.remove_entry(key);
        }
        self.stats.record_deletes(matching.len() as u64);
        matching.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.cleanup_expired_at(current_timestamp_ms())
    }

    pub fn cleanup_expired_at(&mut self, now: u64) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        self.stats.record_expirations(expired.len() as u64);
        expired.len()
    }

    // == Clear ==
    /// Drops every entry; counters are kept.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        count
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.entries.len())
    }

    /// Bytes held by keys and values.
    pub fn size_bytes(&self) -> usize {
        self.entries.values().map(CacheEntry::size_bytes).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.remove(key);
            true
        } else {
            false
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn store(max_entries: usize) -> CacheStore {
        CacheStore::new(LayerConfig::new("test", Duration::from_secs(300), max_entries))
    }

    fn bytes(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn test_store_new() {
        let store = store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.name(), "test");
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = store(100);

        store.set("key1".to_string(), bytes("value1"), None).unwrap();

        assert_eq!(store.get("key1"), Some(bytes("value1")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().sets, 1);
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_store_get_nonexistent_counts_miss() {
        let store = store(100);

        assert_eq!(store.get("nonexistent"), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_delete() {
        let mut store = store(100);

        store.set("key1".to_string(), bytes("value1"), None).unwrap();
        assert_eq!(store.delete("key1"), 1);
        assert_eq!(store.delete("key1"), 0);

        assert!(store.is_empty());
        assert_eq!(store.stats().deletes, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = store(100);

        store.set("key1".to_string(), bytes("value1"), None).unwrap();
        store.set("key1".to_string(), bytes("value2"), None).unwrap();

        assert_eq!(store.get("key1"), Some(bytes("value2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_ttl_expiration_removes_entry() {
        let mut store = store(100);

        store.set_at("key1".to_string(), bytes("v"), Some(Duration::from_secs(1)), 10_000).unwrap();

        assert_eq!(
            store.lookup_at("key1", 10_500, |e| Some(e.value.clone())),
            Lookup::Hit(bytes("v"))
        );
        assert!(store.lookup_at("key1", 11_000, |e| Some(e.value.clone())).is_expired());
        assert!(store.contains_key("key1"));
        assert!(store.expire_at("key1", 11_000));
        assert!(!store.contains_key("key1"));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_store_expire_keeps_live_entries() {
        let mut store = store(100);

        store.set_at("key1".to_string(), bytes("v"), Some(Duration::from_secs(1)), 10_000).unwrap();

        assert!(!store.expire_at("key1", 10_999));
        assert!(!store.expire_at("missing", 10_999));
        assert!(store.contains_key("key1"));
        assert_eq!(store.stats().expirations, 0);
    }

    #[test]
    fn test_store_real_ttl_expiration() {
        let mut store = store(100);

        store.set("key1".to_string(), bytes("v"), Some(Duration::from_secs(1))).unwrap();
        assert!(store.get("key1").is_some());

        sleep(Duration::from_millis(1100));

        assert!(store.get("key1").is_none());
    }

    #[test]
    fn test_store_evicts_oldest_insertion() {
        let mut store = store(3);

        store.set("key1".to_string(), bytes("1"), None).unwrap();
        store.set("key2".to_string(), bytes("2"), None).unwrap();
        store.set("key3".to_string(), bytes("3"), None).unwrap();
        store.set("key4".to_string(), bytes("4"), None).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.stats().evictions, 1);
        assert!(!store.contains_key("key1"));
        assert!(store.contains_key("key4"));
    }

    #[test]
    fn test_store_reads_do_not_protect_from_eviction() {
        let mut store = store(3);

        store.set("key1".to_string(), bytes("1"), None).unwrap();
        store.set("key2".to_string(), bytes("2"), None).unwrap();
        store.set("key3".to_string(), bytes("3"), None).unwrap();
        store.get("key1");
        store.set("key4".to_string(), bytes("4"), None).unwrap();

        assert!(!store.contains_key("key1"));
        assert!(store.contains_key("key2"));
    }

    #[test]
    fn test_store_overwrite_at_capacity_does_not_evict() {
        let mut store = store(2);

        store.set("a".to_string(), bytes("1"), None).unwrap();
        store.set("b".to_string(), bytes("2"), None).unwrap();
        store.set("a".to_string(), bytes("3"), None).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_invalidate_pattern() {
        let mut store = store(100);

        store.set("user:1:profile".to_string(), bytes("p"), None).unwrap();
        store.set("user:1:settings".to_string(), bytes("s"), None).unwrap();
        store.set("user:2:profile".to_string(), bytes("p"), None).unwrap();

        assert_eq!(store.invalidate_pattern("user:1"), 2);
        assert!(store.contains_key("user:2:profile"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().deletes, 2);
    }

    #[test]
    fn test_store_invalidate_pattern_is_case_sensitive_and_empty_matches_nothing() {
        let mut store = store(100);

        store.set("User:1".to_string(), bytes("p"), None).unwrap();

        assert_eq!(store.invalidate_pattern("user:1"), 0);
        assert_eq!(store.invalidate_pattern(""), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = store(100);

        store.set_at("short".to_string(), bytes("1"), Some(Duration::from_secs(1)), 0).unwrap();
        store.set_at("long".to_string(), bytes("2"), Some(Duration::from_secs(10)), 0).unwrap();

        assert_eq!(store.cleanup_expired_at(5_000), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("long"));
    }

    #[test]
    fn test_store_key_validation() {
        let mut store = store(100);

        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(matches!(
            store.set(long_key, bytes("v"), None),
            Err(LayerError::InvalidRequest(_))
        ));
        assert!(matches!(
            store.set(String::new(), bytes("v"), None),
            Err(LayerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_store_value_too_large() {
        let mut store = store(100);
        let large = vec![b'x'; MAX_VALUE_SIZE + 1];

        let result = store.set("key".to_string(), large, None);
        assert!(matches!(result, Err(LayerError::InvalidRequest(_))));
    }

    #[test]
    fn test_store_lookup_reader_rejection_counts_miss() {
        let mut store = store(100);
        store.set("k".to_string(), bytes("v"), None).unwrap();

        let value: Lookup<u8> = store.lookup("k", |_| None);

        assert_eq!(value, Lookup::Miss);
        assert_eq!(store.stats().misses, 1);
        assert_eq!(store.stats().hits, 0);
        assert!(store.contains_key("k"));
    }
}
