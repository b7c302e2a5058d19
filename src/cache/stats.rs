//! Cache Statistics Module
//!
//! Tracks two-tier cache hits per tier, misses, and sweep evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads answered by the local tier
    pub local_hits: u64,
    /// Reads that missed locally and were answered by the remote store
    pub remote_hits: u64,
    /// Reads found in neither tier
    pub misses: u64,
    /// Local entries removed by the sweeper
    pub evictions: u64,
    /// Entries currently held by the local tier
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Fraction of reads answered by either tier, 0.0 if nothing was read.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.local_hits + self.remote_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters updated on the read path.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    local_hits: AtomicU64,
    remote_hits: AtomicU64,
    misses: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, evictions: u64, total_entries: usize) -> CacheStats {
        CacheStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions,
            total_entries,
        }
    }
}
