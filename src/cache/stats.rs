//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::{Deserialize, Serialize};

// == Cache Stats ==
/// Cache-wide counters. Mutated only under the store lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    /// Sum of the sizes of all entries resident in the memory tier
    pub size: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Takes the monotonic counters from persisted stats. `size` is left
    /// alone: it always describes the current memory tier.
    pub fn restore_counters(&mut self, persisted: &CacheStats) {
        self.hits = persisted.hits;
        self.misses = persisted.misses;
        self.sets = persisted.sets;
        self.deletes = persisted.deletes;
        self.evictions = persisted.evictions;
    }
}

// == Stats Snapshot ==
/// Point-in-time view returned by `Cache::stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub size: u64,
    pub max_size: u64,
    pub item_count: usize,
    pub hit_rate: f64,
    /// size / max_size
    pub utilization: f64,
}

impl StatsSnapshot {
    pub fn new(stats: &CacheStats, max_size: u64, item_count: usize) -> Self {
        let utilization = if max_size == 0 {
            0.0
        } else {
            stats.size as f64 / max_size as f64
        };

        Self {
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            deletes: stats.deletes,
            evictions: stats.evictions,
            size: stats.size,
            max_size,
            item_count,
            hit_rate: stats.hit_rate(),
            utilization,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.deletes, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.25);
    }

    #[test]
    fn test_record_counters() {
        let mut stats = CacheStats::new();
        stats.record_set();
        stats.record_set();
        stats.record_delete();
        stats.record_eviction();
        assert_eq!(stats.sets, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_restore_counters_keeps_size() {
        let mut stats = CacheStats::new();
        stats.size = 12;

        let persisted = CacheStats {
            hits: 5,
            misses: 3,
            sets: 9,
            deletes: 1,
            evictions: 2,
            size: 999,
        };
        stats.restore_counters(&persisted);

        assert_eq!(stats.hits, 5);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.size, 12);
    }

    #[test]
    fn test_snapshot_utilization() {
        let mut stats = CacheStats::new();
        stats.size = 25;
        stats.record_hit();

        let snapshot = StatsSnapshot::new(&stats, 100, 3);
        assert_eq!(snapshot.utilization, 0.25);
        assert_eq!(snapshot.hit_rate, 1.0);
        assert_eq!(snapshot.item_count, 3);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"hitRate\""));
        assert!(json.contains("\"maxSize\":100"));
    }
}
