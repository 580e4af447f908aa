//! Cache Statistics Module
//!
//! Lock-free counters updated on the hot path, plus the serializable
//! snapshot handed to reporting code.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Metrics ==
/// Running counters shared by every caller of the engine.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    null_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
    idle_removals: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A read that found a cached "no result" marker.
    pub fn record_null_hit(&self) {
        self.null_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired_removals(&self, count: usize) {
        self.expired_removals
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_idle_removals(&self, count: usize) {
        self.idle_removals.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn null_hits(&self) -> u64 {
        self.null_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expired_removals(&self) -> u64 {
        self.expired_removals.load(Ordering::Relaxed)
    }

    pub fn idle_removals(&self) -> u64 {
        self.idle_removals.load(Ordering::Relaxed)
    }
}

// == Cache Stats ==
/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently stored, expired or not
    pub total_entries: usize,
    /// Stored entries already past their TTL
    pub expired_entries: usize,
    /// Sum of per-entry read counts
    pub total_access_count: u64,
    /// Reads that found a value or a cached absence
    pub hits: u64,
    /// Of `hits`, the ones served by a cached absence
    pub null_hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries dropped by size-bound eviction
    pub evictions: u64,
    /// Entries dropped by the expired sweep
    pub expired_removals: u64,
    /// Entries dropped by the unused sweep
    pub idle_removals: u64,
    /// Keys with an in-flight load
    pub pending_locks: usize,
    /// Share of bloom filter bits set; near 1.0 the filter stops rejecting
    pub bloom_fill_ratio: f64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    pub generated_at: DateTime<Utc>,
}

impl CacheStats {
    /// Combines store-derived figures with the running counters.
    pub fn from_parts(
        total_entries: usize,
        expired_entries: usize,
        total_access_count: u64,
        pending_locks: usize,
        bloom_fill_ratio: f64,
        metrics: &CacheMetrics,
    ) -> Self {
        let hits = metrics.hits() + metrics.null_hits();
        let misses = metrics.misses();
        Self {
            total_entries,
            expired_entries,
            total_access_count,
            hits,
            null_hits: metrics.null_hits(),
            misses,
            evictions: metrics.evictions(),
            expired_removals: metrics.expired_removals(),
            idle_removals: metrics.idle_removals(),
            pending_locks,
            bloom_fill_ratio,
            hit_rate: hit_rate(hits, misses),
            generated_at: Utc::now(),
        }
    }
}

/// Returns hits / (hits + misses), or 0.0 if no requests have been made.
fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
