//! Cache Engine Module
//!
//! [`Cache`] ties the entry store, bloom filter and key-lock registry
//! together and applies the TTL, negative-caching and disabled-mode
//! policies. Share one instance behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::{
    BloomFilter, CacheEntry, CacheMetrics, CacheStats, CacheStrategy, CacheSwitch, CounterValue,
    EntryStore, KeyLockRegistry, KeyPattern, Lookup, Slot, EXPIRE_ABSENT,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweepers, SweeperHandles};

// == Cache ==
/// Shared in-process cache.
///
/// No operation takes a cache-wide lock. The only waiting point is the
/// per-key lock on the miss path of [`Cache::get_or_compute`].
pub struct Cache<V> {
    store: EntryStore<V>,
    bloom: BloomFilter,
    locks: KeyLockRegistry,
    /// Writers share it; a full clear takes it exclusively so bloom bits
    /// and entries are reset together
    reset_gate: RwLock<()>,
    metrics: Arc<CacheMetrics>,
    switch: Arc<dyn CacheSwitch>,
    config: CacheConfig,
    sweepers: Mutex<Option<SweeperHandles>>,
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.store.len())
            .field("max_entries", &self.store.max_entries())
            .field("pending_locks", &self.locks.len())
            .finish()
    }
}

impl<V> Cache<V> {
    // == Constructors ==
    /// Builds a cache whose switch is fixed to `config.enabled`.
    pub fn new(config: CacheConfig) -> Self {
        let switch = Arc::new(AtomicBool::new(config.enabled));
        Self::with_switch(config, switch)
    }

    /// Builds a cache polling `switch` on every operation.
    pub fn with_switch(config: CacheConfig, switch: Arc<dyn CacheSwitch>) -> Self {
        let metrics = Arc::new(CacheMetrics::new());
        Self {
            store: EntryStore::new(config.max_entries, Arc::clone(&metrics)),
            bloom: BloomFilter::new(config.bloom_bits),
            locks: KeyLockRegistry::new(),
            reset_gate: RwLock::new(()),
            metrics,
            switch,
            config,
            sweepers: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.switch.is_enabled()
    }

    fn enabled_for(&self, operation: &'static str, key: &str) -> bool {
        let enabled = self.switch.is_enabled();
        if !enabled {
            debug!(event = "CACHE_DISABLED", key, operation, "Cache disabled, skipping");
        }
        enabled
    }

    fn write(&self, key: String, slot: Slot<V>, ttl: Duration) {
        let absent = slot.is_absent();
        {
            let _gate = self.reset_gate.read();
            self.bloom.insert(&key);
            self.store.insert(key.clone(), CacheEntry::new(slot, ttl));
        }
        if absent {
            debug!(event = "CACHE_PUT_NULL", key = %key, ttl_ms = ttl.as_millis() as u64, "Cached empty result");
        } else {
            debug!(event = "CACHE_PUT", key = %key, ttl_ms = ttl.as_millis() as u64, "Cached value");
        }
    }

    // == Remove ==
    /// Drops `key`. No-op when disabled.
    pub fn remove(&self, key: &str) {
        if !self.enabled_for("remove", key) {
            return;
        }
        if self.store.remove(key) {
            info!(event = "CACHE_REMOVE", key, "Removed cache entry");
        }
    }

    /// Alias of [`Cache::remove`].
    pub fn delete(&self, key: &str) {
        self.remove(key);
    }

    // == Clear ==
    /// Drops every entry and resets the bloom filter. No-op when disabled.
    ///
    /// Key locks are left alone; a slot is only ever removed by its last
    /// holder.
    pub fn clear(&self) {
        if !self.enabled_for("clear", "*") {
            return;
        }
        let cleared = self.clear_state();
        info!(event = "CACHE_CLEAR", cleared, "Cleared cache");
    }

    fn clear_state(&self) -> usize {
        let _gate = self.reset_gate.write();
        let cleared = self.store.clear();
        self.bloom.clear();
        cleared
    }

    // == Exists ==
    /// True if `key` holds a live value. Cached absences and disabled mode
    /// report false. Does not count as a read.
    pub fn exists(&self, key: &str) -> bool {
        self.enabled_for("exists", key) && self.store.contains_value(key)
    }

    // == Get Expire ==
    /// Remaining whole seconds of `key`'s TTL, or [`EXPIRE_ABSENT`] (`-2`)
    /// when the key is absent, expired, or the cache is disabled.
    pub fn get_expire_seconds(&self, key: &str) -> i64 {
        if !self.switch.is_enabled() {
            return EXPIRE_ABSENT;
        }
        self.store
            .ttl_remaining_ms(key)
            .filter(|ms| *ms > 0)
            .map_or(EXPIRE_ABSENT, |ms| i64::try_from(ms / 1000).unwrap_or(i64::MAX))
    }

    // == Pattern Operations ==
    /// Removes every key matching a `*` wildcard pattern. Full scan.
    /// An invalid pattern removes nothing.
    pub fn remove_by_pattern(&self, pattern: &str) -> usize {
        if !self.enabled_for("remove_by_pattern", pattern) {
            return 0;
        }
        let removed = self.store.remove_matching(&KeyPattern::compile(pattern));
        info!(event = "CACHE_REMOVE_PATTERN", pattern, removed, "Removed entries by pattern");
        removed
    }

    /// True if a live entry matches a `*` wildcard pattern. Full scan.
    pub fn has_keys_matching(&self, pattern: &str) -> bool {
        self.enabled_for("has_keys_matching", pattern)
            && self.store.any_live_matching(&KeyPattern::compile(pattern))
    }

    // == Sweeps ==
    /// Removes expired entries. Runs regardless of the switch.
    pub fn sweep_expired(&self) -> usize {
        let cleaned = self.store.sweep_expired();
        if cleaned > 0 {
            info!(event = "CACHE_CLEANUP_EXPIRED", cleaned, "Removed expired entries");
        } else {
            debug!(event = "CACHE_CLEANUP_EXPIRED", cleaned, "No expired entries found");
        }
        cleaned
    }

    /// Removes entries that were never read and are older than the
    /// configured idle threshold, whatever their TTL.
    pub fn sweep_idle(&self) -> usize {
        let cleaned = self.store.sweep_idle(self.config.idle_threshold);
        if cleaned > 0 {
            info!(event = "CACHE_CLEANUP_UNUSED", cleaned, "Removed unused entries");
        } else {
            debug!(event = "CACHE_CLEANUP_UNUSED", cleaned, "No unused entries found");
        }
        cleaned
    }

    // == Stats ==
    /// Snapshot of sizes and counters. One full scan of the store.
    pub fn stats(&self) -> CacheStats {
        let snapshot = self.store.snapshot();
        let bloom_fill_ratio = self.bloom.set_bits() as f64 / self.bloom.num_bits() as f64;
        CacheStats::from_parts(
            snapshot.total_entries,
            snapshot.expired_entries,
            snapshot.total_access_count,
            self.locks.len(),
            bloom_fill_ratio,
            &self.metrics,
        )
    }

    // == Length ==
    /// Stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // == Shutdown ==
    /// Stops the sweepers and drops all entries and bloom bits.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(sweepers) = self.sweepers.lock().take() {
            sweepers.abort();
        }
        let cleared = self.clear_state();
        info!(event = "CACHE_SHUTDOWN", cleared, "Cache shut down");
    }
}

impl<V: Clone> Cache<V> {
    // == Put ==
    /// Stores `value` for `ttl`. When the table is full and the key is new,
    /// the entry with the oldest access time is evicted first.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        if !self.enabled_for("put", &key) {
            return;
        }
        self.write(key, Slot::Value(value), ttl);
    }

    /// Stores `value` with the configured default TTL.
    pub fn put_default(&self, key: impl Into<String>, value: V) {
        self.put(key, value, self.config.default_ttl);
    }

    pub fn put_with_strategy(&self, key: impl Into<String>, value: V, strategy: CacheStrategy) {
        self.put(key, value, strategy.ttl());
    }

    // == Get ==
    /// Returns the live value under `key`.
    ///
    /// Keys the bloom filter has never seen miss without probing the store.
    /// A cached absence also reads as `None` but is counted as a hit.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.enabled_for("get", key) {
            return None;
        }
        if !self.bloom.might_contain(key) {
            self.metrics.record_miss();
            debug!(event = "CACHE_MISS_BLOOM", key, "Bloom filter rejected key");
            return None;
        }
        self.read(key).and_then(Slot::into_value)
    }

    /// Reads the store, recording the outcome.
    fn read(&self, key: &str) -> Option<Slot<V>> {
        match self.store.lookup(key) {
            Lookup::Hit(slot) => {
                self.record_hit(key, &slot);
                Some(slot)
            }
            Lookup::Expired => {
                self.metrics.record_miss();
                debug!(event = "CACHE_EXPIRED", key, "Entry expired");
                None
            }
            Lookup::Missing => {
                self.metrics.record_miss();
                debug!(event = "CACHE_MISS", key, "Cache miss");
                None
            }
        }
    }

    fn record_hit(&self, key: &str, slot: &Slot<V>) {
        if slot.is_absent() {
            self.metrics.record_null_hit();
            debug!(event = "CACHE_HIT_NULL", key, "Cached empty result");
        } else {
            self.metrics.record_hit();
            debug!(event = "CACHE_HIT", key, "Cache hit");
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, loading it on a miss.
    ///
    /// At most one `loader` runs per key at a time; concurrent callers for
    /// the same key wait for it and then read its result from the store.
    /// `Ok(Some(v))` is cached for `ttl`, `Ok(None)` is cached as an
    /// absence for the configured null TTL, and `Err` is returned as-is
    /// without caching anything.
    ///
    /// The loader is not time-bounded; wrap it in `tokio::time::timeout` if
    /// a slow source must not hold up waiters.
    ///
    /// When the cache is disabled the loader runs on every call.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> std::result::Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<V>, E>>,
    {
        if !self.switch.is_enabled() {
            debug!(
                event = "CACHE_DISABLED",
                key,
                operation = "get_or_compute",
                "Cache disabled, calling loader directly"
            );
            return loader().await;
        }

        // An unseen key cannot be in the store; skip straight to the locked
        // check, which stays authoritative.
        if self.bloom.might_contain(key) {
            if let Some(slot) = self.read(key) {
                return Ok(slot.into_value());
            }
        } else {
            self.metrics.record_miss();
            debug!(event = "CACHE_MISS_BLOOM", key, "Bloom filter rejected key");
        }

        let _guard = self.locks.lock(key).await;

        // Another caller may have loaded it while we waited
        if let Lookup::Hit(slot) = self.store.lookup(key) {
            self.record_hit(key, &slot);
            return Ok(slot.into_value());
        }

        let started = Instant::now();
        let loaded = loader().await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let slot = Slot::from(loaded.clone());
        let ttl = if slot.is_absent() {
            self.config.null_ttl
        } else {
            ttl
        };
        self.write(key.to_owned(), slot, ttl);
        debug!(
            event = "CACHE_MISS",
            key,
            computed = true,
            found = loaded.is_some(),
            elapsed_ms,
            "Loaded value"
        );
        Ok(loaded)
    }

    /// [`Cache::get_or_compute`] with the default TTL.
    pub async fn get_or_compute_default<F, Fut, E>(
        &self,
        key: &str,
        loader: F,
    ) -> std::result::Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<V>, E>>,
    {
        self.get_or_compute(key, self.config.default_ttl, loader)
            .await
    }

    /// [`Cache::get_or_compute`] with a strategy's TTL.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        key: &str,
        strategy: CacheStrategy,
        loader: F,
    ) -> std::result::Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<V>, E>>,
    {
        self.get_or_compute(key, strategy.ttl(), loader).await
    }

    // == Warm Up ==
    /// Loads `key` eagerly and stores it with the strategy's TTL.
    ///
    /// Returns true if a value was stored. Empty results and loader errors
    /// are logged, not propagated.
    pub async fn warm_up<F, Fut, E>(&self, key: &str, strategy: CacheStrategy, loader: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<V>, E>>,
        E: fmt::Display,
    {
        info!(event = "CACHE_WARMUP_START", key, "Warming cache entry");
        match loader().await {
            Ok(Some(value)) => {
                self.put_with_strategy(key, value, strategy);
                info!(event = "CACHE_WARMUP_COMPLETE", key, "Cache entry warmed");
                true
            }
            Ok(None) => {
                warn!(event = "CACHE_WARMUP_EMPTY_DATA", key, "Warm-up loader returned no data");
                false
            }
            Err(err) => {
                error!(event = "CACHE_WARMUP_FAILED", key, error = %err, "Warm-up loader failed");
                false
            }
        }
    }

    // == Batch Operations ==
    /// Reads several keys; only hits appear in the result.
    pub fn multi_get<I, K>(&self, keys: I) -> HashMap<String, V>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        if !self.enabled_for("multi_get", "*") {
            return HashMap::new();
        }
        let mut requested = 0usize;
        let found: HashMap<String, V> = keys
            .into_iter()
            .inspect(|_| requested += 1)
            .filter_map(|key| {
                let key = key.as_ref();
                self.get(key).map(|value| (key.to_owned(), value))
            })
            .collect();
        debug!(event = "CACHE_MULTI_GET", keys = requested, hits = found.len(), "Batch read");
        found
    }

    /// Stores several values with one TTL.
    pub fn multi_put<I, K>(&self, entries: I, ttl: Duration)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        if !self.enabled_for("multi_put", "*") {
            return;
        }
        let mut written = 0usize;
        for (key, value) in entries {
            self.write(key.into(), Slot::Value(value), ttl);
            written += 1;
        }
        info!(event = "CACHE_MULTI_PUT", keys = written, ttl_ms = ttl.as_millis() as u64, "Batch write");
    }

    // == Set If Absent ==
    /// Stores `value` only if no live entry holds `key`. The check and the
    /// write are one atomic step on the store. Returns false when disabled.
    pub fn set_if_absent(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        let key = key.into();
        if !self.enabled_for("set_if_absent", &key) {
            return false;
        }
        let stored = {
            let _gate = self.reset_gate.read();
            self.bloom.insert(&key);
            self.store
                .insert_if_absent(key.clone(), CacheEntry::new(Slot::Value(value), ttl))
        };
        if stored {
            debug!(event = "CACHE_SET_IF_ABSENT", key = %key, ttl_ms = ttl.as_millis() as u64, "Stored absent key");
        }
        stored
    }

    // == Expire ==
    /// Restarts `key`'s lifetime at `ttl` from now, keeping its value. The
    /// entry is replaced, not mutated. No-op if the key is absent, expired,
    /// or the cache is disabled.
    pub fn expire(&self, key: &str, ttl: Duration) {
        if !self.enabled_for("expire", key) {
            return;
        }
        if self.store.renew(key, ttl) {
            info!(event = "CACHE_EXPIRE_SET", key, ttl_ms = ttl.as_millis() as u64, "Reset entry TTL");
        }
    }
}

impl<V: Clone + PartialEq> Cache<V> {
    // == Compare And Delete ==
    /// Removes `key` only while it holds `expected`, e.g. releasing a lock
    /// token owned by the caller. Returns false when disabled.
    pub fn remove_if_equals(&self, key: &str, expected: &V) -> bool {
        if !self.enabled_for("remove_if_equals", key) {
            return false;
        }
        let removed = self
            .store
            .remove_if(key, |slot| slot.as_value() == Some(expected));
        if removed {
            info!(event = "CACHE_REMOVE", key, conditional = true, "Removed matching entry");
        }
        removed
    }
}

impl<V: Clone + CounterValue> Cache<V> {
    // == Increment ==
    /// Adds `delta` to the counter under `key` and returns the new value.
    ///
    /// Missing, expired or negatively cached keys start from zero. The
    /// read-modify-write holds the key's store shard, so concurrent
    /// increments never lose updates. The result is stored with the default
    /// TTL. Disabled mode returns `Ok(0)` without writing.
    pub fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        if !self.enabled_for("increment", key) {
            return Ok(0);
        }
        let _gate = self.reset_gate.read();
        self.bloom.insert(key);
        let updated = self
            .store
            .compute(key, self.config.default_ttl, |current| -> Result<(Slot<V>, i64)> {
                let base = match current {
                    None | Some(Slot::Absent) => 0,
                    Some(Slot::Value(value)) => value
                        .to_counter()
                        .ok_or_else(|| CacheError::NotACounter(key.to_owned()))?,
                };
                let next = base
                    .checked_add(delta)
                    .ok_or_else(|| CacheError::CounterOverflow(key.to_owned()))?;
                Ok((Slot::Value(V::from_counter(next)), next))
            })?;
        debug!(event = "CACHE_INCREMENT", key, delta, value = updated, "Incremented counter");
        Ok(updated)
    }
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    // == Start ==
    /// Validates `config`, builds the cache and spawns both sweepers on the
    /// current tokio runtime. The sweepers stop on [`Cache::shutdown`] or
    /// once the last `Arc` is dropped.
    pub fn start(config: CacheConfig, switch: Arc<dyn CacheSwitch>) -> Result<Arc<Self>> {
        config.validate()?;
        let cache = Arc::new(Self::with_switch(config, switch));
        let sweepers = spawn_sweepers(&cache);
        *cache.sweepers.lock() = Some(sweepers);
        info!(
            event = "CACHE_START",
            max_entries = cache.config.max_entries,
            "Cache started with background sweepers"
        );
        Ok(cache)
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        if let Some(sweepers) = self.sweepers.get_mut().take() {
            sweepers.abort();
        }
    }
}
