//! Cache Statistics Module
//!
//! Tracks lookup hits and misses along with every way an entry can leave the cache.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered by an existing entry
    pub hits: u64,
    /// Lookups that found no matching entry
    pub misses: u64,
    /// Values produced by a loader and inserted after a miss
    pub loads: u64,
    /// Entries dropped to make room under the size limit
    pub evictions: u64,
    /// Entries removed by the sweeper (expire or refresh)
    pub expirations: u64,
    /// Entries removed explicitly by callers
    pub removals: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Load ==
    /// Increments the loader counter.
    pub fn record_load(&mut self) {
        self.loads += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Expirations ==
    /// Adds `count` sweeper removals.
    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    // == Record Removal ==
    /// Increments the explicit removal counter.
    pub fn record_removal(&mut self) {
        self.removals += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_removal_counters() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_expirations(3);
        stats.record_removal();
        stats.record_load();

        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.removals, 1);
        assert_eq!(stats.loads, 1);
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.set_total_entries(7);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["total_entries"], 7);
        assert_eq!(json["expirations"], 0);
    }
}
