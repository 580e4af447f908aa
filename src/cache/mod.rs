//! Cache Module
//!
//! In-process cache engine with TTL expiry, negative caching, single-flight
//! loading, bloom-filter fast rejects and size-bound eviction.

mod bloom;
mod counter;
mod engine;
mod entry;
mod locks;
mod pattern;
mod stats;
mod store;
mod strategy;
mod switch;


use std::time::Duration;

// Re-export public types
pub use bloom::BloomFilter;
pub use counter::CounterValue;
pub use engine::Cache;
pub use entry::{current_timestamp_ms, CacheEntry, Slot};
pub use locks::{KeyLockGuard, KeyLockRegistry};
pub use pattern::KeyPattern;
pub use stats::{CacheMetrics, CacheStats};
pub use store::{EntryStore, Lookup, StoreSnapshot};
pub use strategy::CacheStrategy;
pub use switch::{CacheSwitch, SwitchFn};

// == Public Constants ==
/// TTL applied when the caller gives none
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// TTL of a cached "no result"
pub const DEFAULT_NULL_TTL: Duration = Duration::from_secs(5 * 60);

/// Entry count at which writes start evicting
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Age after which a never-read entry is reclaimed
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Bloom filter size in bits
pub const DEFAULT_BLOOM_BITS: usize = 1_000_000;

/// Returned by `Cache::get_expire_seconds` for absent or expired keys
pub const EXPIRE_ABSENT: i64 = -2;
