//! Configuration Module
//!
//! Loads cache engine settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{
    DEFAULT_BLOOM_BITS, DEFAULT_IDLE_THRESHOLD, DEFAULT_MAX_ENTRIES, DEFAULT_NULL_TTL,
    DEFAULT_TTL,
};
use crate::error::{CacheError, Result};

/// Cache engine configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Initial value of the enabled switch
    pub enabled: bool,
    /// Maximum number of entries before size-bound eviction kicks in
    pub max_entries: usize,
    /// TTL used when the caller gives none
    pub default_ttl: Duration,
    /// TTL for cached "no result" markers
    pub null_ttl: Duration,
    /// Interval of the expired-entry sweep
    pub expired_sweep_interval: Duration,
    /// Interval of the unused-entry sweep
    pub idle_sweep_interval: Duration,
    /// Age after which a never-read entry counts as unused
    pub idle_threshold: Duration,
    /// Size of the bloom filter bit array
    pub bloom_bits: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ENABLED` - Caching switch (default: true)
    /// - `CACHE_MAX_ENTRIES` - Maximum entries (default: 10000)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL (default: 1800)
    /// - `CACHE_NULL_TTL_SECS` - Negative cache TTL (default: 300)
    /// - `CACHE_EXPIRED_SWEEP_SECS` - Expired sweep interval (default: 300)
    /// - `CACHE_IDLE_SWEEP_SECS` - Unused sweep interval (default: 3600)
    /// - `CACHE_IDLE_THRESHOLD_SECS` - Unused entry age (default: 3600)
    /// - `CACHE_BLOOM_BITS` - Bloom filter size (default: 1000000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_or("CACHE_ENABLED", defaults.enabled),
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            default_ttl: env_secs_or("CACHE_DEFAULT_TTL_SECS", defaults.default_ttl),
            null_ttl: env_secs_or("CACHE_NULL_TTL_SECS", defaults.null_ttl),
            expired_sweep_interval: env_secs_or(
                "CACHE_EXPIRED_SWEEP_SECS",
                defaults.expired_sweep_interval,
            ),
            idle_sweep_interval: env_secs_or("CACHE_IDLE_SWEEP_SECS", defaults.idle_sweep_interval),
            idle_threshold: env_secs_or("CACHE_IDLE_THRESHOLD_SECS", defaults.idle_threshold),
            bloom_bits: env_or("CACHE_BLOOM_BITS", defaults.bloom_bits),
        }
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        if self.bloom_bits == 0 {
            return Err(CacheError::InvalidConfig(
                "bloom_bits must be greater than 0".to_string(),
            ));
        }
        if self.expired_sweep_interval.is_zero() || self.idle_sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            null_ttl: DEFAULT_NULL_TTL,
            expired_sweep_interval: Duration::from_secs(300),
            idle_sweep_interval: Duration::from_secs(3600),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            bloom_bits: DEFAULT_BLOOM_BITS,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_secs_or(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
