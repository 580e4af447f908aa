//! Guarded Cache - an in-process cache for data-access layers
//!
//! Provides TTL expiry, negative caching, single-flight loading,
//! bloom-filter fast rejects and size-bound eviction.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats, CacheStrategy, CacheSwitch};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweepers;
