//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, sets, deletes
//! and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Live counters kept by each layer.
///
/// Counters are atomic so lookups can record hits and misses while the layer
/// is only read-locked. Read them through [`CacheStats::snapshot`].
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Successful retrievals
    hits: AtomicU64,
    /// Failed retrievals (absent, expired or undecodable)
    misses: AtomicU64,
    /// Insertions and overwrites
    sets: AtomicU64,
    /// Entries removed by explicit delete or pattern invalidation
    deletes: AtomicU64,
    /// Entries evicted to make room at capacity
    evictions: AtomicU64,
    /// Entries dropped because their TTL elapsed
    expirations: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Freezes the counters together with the derived ratios.
    pub fn snapshot(&self, total_entries: usize) -> CacheStatsSnapshot {
        let mut snapshot = CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            total_entries,
            ..CacheStatsSnapshot::default()
        };
        snapshot.refresh_ratios();
        snapshot
    }
}

// == Cache Stats Snapshot ==
/// Point-in-time view of a layer (or of all layers combined).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Entries currently resident
    pub total_entries: usize,
    /// Percentage in [0, 100]
    pub hit_ratio: f64,
    pub total_ops: u64,
}

impl CacheStatsSnapshot {
    // == Hit Ratio ==
    /// Sets `hit_ratio` to hits / (hits + misses) * 100, or 0.0 when no
    /// lookups have happened, and `total_ops` to reads plus writes plus
    /// deletes.
    fn refresh_ratios(&mut self) {
        let lookups = self.hits + self.misses;
        self.hit_ratio = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64 * 100.0
        };
        self.total_ops = self.hits + self.misses + self.sets + self.deletes;
    }

    // == Merge ==
    /// Adds another layer's view into this one and recomputes the ratios.
    pub fn merge(&mut self, other: &CacheStatsSnapshot) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.sets += other.sets;
        self.deletes += other.deletes;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
        self.total_entries += other.total_entries;
        self.refresh_ratios();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_stats_new() {
        let snap = CacheStats::new().snapshot(0);
        assert_eq!(snap, CacheStatsSnapshot::default());
        assert_eq!(snap.total_ops, 0);
    }

    #[test]
    fn test_hit_ratio_no_requests() {
        let snap = CacheStats::new().snapshot(0);
        assert_eq!(snap.hit_ratio, 0.0);
    }

    #[test]
    fn test_hit_ratio_is_percentage() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.snapshot(0).hit_ratio, 75.0);
    }

    #[test]
    fn test_total_ops_counts_reads_writes_deletes() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_set();
        stats.record_deletes(2);
        stats.record_eviction();

        let snap = stats.snapshot(0);
        assert_eq!(snap.total_ops, 5);
        assert_eq!(snap.evictions, 1);
    }

    #[test]
    fn test_merge_snapshots() {
        let a = CacheStats::new();
        a.record_hit();
        a.record_set();
        let b = CacheStats::new();
        b.record_miss();
        b.record_expirations(3);

        let mut combined = a.snapshot(4);
        combined.merge(&b.snapshot(3));

        assert_eq!(combined.hits, 1);
        assert_eq!(combined.misses, 1);
        assert_eq!(combined.expirations, 3);
        assert_eq!(combined.total_entries, 7);
        assert_eq!(combined.hit_ratio, 50.0);
        assert_eq!(combined.total_ops, 3);
    }

    #[test]
    fn test_counters_are_shared_across_threads() {
        let stats = Arc::new(CacheStats::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_hit();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.snapshot(0).hits, 8000);
    }
}
