//! Entry Store Module
//!
//! Sharded concurrent map from key to [`CacheEntry`], with size-bound
//! eviction at write time and the sweeps used by the background tasks.
//!
//! Size-bound eviction scans every entry for the smallest `last_access_at`.
//! This is O(n) per eviction; acceptable for tables of a few tens of
//! thousands of entries. Writes that add a key go through one admission
//! lock so concurrent writers cannot push the table past `max_entries`;
//! overwrites of an existing key skip it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::entry::{current_timestamp_ms, duration_ms};
use crate::cache::{CacheEntry, CacheMetrics, KeyPattern, Slot};

// == Lookup ==
/// Outcome of reading one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Live entry; the read was recorded on it
    Hit(Slot<V>),
    /// Entry was past its TTL and has been dropped
    Expired,
    Missing,
}

/// Aggregate figures gathered in one pass over the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_access_count: u64,
}

// == Entry Store ==
#[derive(Debug)]
pub struct EntryStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    max_entries: usize,
    /// Serializes writes that add a key
    admission: Mutex<()>,
    metrics: Arc<CacheMetrics>,
}

impl<V> EntryStore<V> {
    // == Constructor ==
    pub fn new(max_entries: usize, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            admission: Mutex::new(()),
            metrics,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // == Insert ==
    /// Installs `entry`, evicting the least recently accessed entries first
    /// when the table is full and `key` is new.
    pub fn insert(&self, key: String, entry: CacheEntry<V>) {
        if let Some(mut current) = self.entries.get_mut(&key) {
            *current = entry;
            return;
        }
        let _admission = self.admission.lock();
        self.make_room(&key);
        self.entries.insert(key, entry);
    }

    /// Installs `entry` unless a live entry already holds `key`.
    ///
    /// The check and the write happen under the same shard lock.
    pub fn insert_if_absent(&self, key: String, entry: CacheEntry<V>) -> bool {
        let _admission = self.admission.lock();
        self.make_room(&key);
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(entry);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
        }
    }

    /// Atomic read-modify-write of one key.
    ///
    /// `f` sees the live slot (expired entries read as `None`) and returns
    /// the slot to store plus a result for the caller. An error from `f`
    /// leaves the entry untouched.
    pub fn compute<R, E>(
        &self,
        key: &str,
        ttl: Duration,
        f: impl FnOnce(Option<&Slot<V>>) -> Result<(Slot<V>, R), E>,
    ) -> Result<R, E> {
        if let Some(mut current) = self.entries.get_mut(key) {
            let live = if current.is_expired() {
                None
            } else {
                Some(current.slot())
            };
            let (slot, out) = f(live)?;
            *current = CacheEntry::new(slot, ttl);
            return Ok(out);
        }

        let _admission = self.admission.lock();
        self.make_room(key);
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let current = if occupied.get().is_expired() {
                    None
                } else {
                    Some(occupied.get().slot())
                };
                let (slot, out) = f(current)?;
                occupied.insert(CacheEntry::new(slot, ttl));
                Ok(out)
            }
            Entry::Vacant(vacant) => {
                let (slot, out) = f(None)?;
                vacant.insert(CacheEntry::new(slot, ttl));
                Ok(out)
            }
        }
    }

    // == Remove ==
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes `key` only if it is live and `predicate` accepts its slot.
    pub fn remove_if(&self, key: &str, predicate: impl FnOnce(&Slot<V>) -> bool) -> bool {
        self.entries
            .remove_if(key, |_, entry| !entry.is_expired() && predicate(entry.slot()))
            .is_some()
    }

    // == Clear ==
    /// Drops every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    // == Contains Value ==
    /// True if `key` holds an unexpired value (a cached absence does not
    /// count). Not recorded as an access; an expired entry found here is
    /// dropped.
    pub fn contains_value(&self, key: &str) -> bool {
        match self.entries.get(key) {
            None => return false,
            Some(entry) if !entry.is_expired() => return !entry.slot().is_absent(),
            Some(_) => {}
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        false
    }

    /// Remaining TTL of a live entry in milliseconds.
    pub fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl_remaining_ms())
    }

    // == Sweeps ==
    /// Removes every expired entry, returning the count.
    pub fn sweep_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.metrics.record_expired_removals(removed);
        removed
    }

    /// Removes entries never read whose last touch is older than `threshold`.
    pub fn sweep_idle(&self, threshold: Duration) -> usize {
        let cutoff = current_timestamp_ms().saturating_sub(duration_ms(threshold));
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_idle(cutoff);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.metrics.record_idle_removals(removed);
        removed
    }

    // == Pattern Scans ==
    /// Removes every key matching `pattern`, live or not.
    pub fn remove_matching(&self, pattern: &KeyPattern) -> usize {
        if !pattern.is_valid() {
            return 0;
        }
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = !pattern.matches(key);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// True if any live value's key matches `pattern`; cached absences
    /// are skipped, as in [`EntryStore::contains_value`].
    pub fn any_live_matching(&self, pattern: &KeyPattern) -> bool {
        pattern.is_valid()
            && self
                .entries
                .iter()
                .any(|entry| {
                    !entry.is_expired()
                        && !entry.slot().is_absent()
                        && pattern.matches(entry.key())
                })
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> StoreSnapshot {
        let now = current_timestamp_ms();
        self.entries
            .iter()
            .fold(StoreSnapshot::default(), |mut snapshot, entry| {
                snapshot.total_entries += 1;
                if entry.is_expired_at(now) {
                    snapshot.expired_entries += 1;
                }
                snapshot.total_access_count += entry.access_count();
                snapshot
            })
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Eviction ==
    /// Evicts until there is room for `key`. Callers hold the admission lock.
    fn make_room(&self, key: &str) {
        while self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            // None means a concurrent remove won the victim; rescan
            if let Some(evicted) = self.evict_lru() {
                self.metrics.record_eviction();
                debug!(event = "CACHE_LRU_EVICT", key = %evicted, "Evicted least recently accessed entry");
            }
        }
    }

    /// Full scan for the entry with the oldest access time.
    fn evict_lru(&self) -> Option<String> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_access_at())
            .map(|entry| entry.key().clone())?;
        self.entries.remove(&victim).map(|(key, _)| key)
    }
}

impl<V: Clone> EntryStore<V> {
    // == Get ==
    /// Reads `key`, recording the access on a hit and dropping the entry if
    /// it has expired.
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        match self.entries.get(key) {
            None => return Lookup::Missing,
            Some(entry) if !entry.is_expired() => return Lookup::Hit(entry.read().clone()),
            Some(_) => {}
        }
        // A writer may have replaced it since the check
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Lookup::Expired
    }

    // == Renew ==
    /// Replaces a live entry with a copy carrying a fresh TTL.
    pub fn renew(&self, key: &str, ttl: Duration) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                let renewed = entry.renewed(ttl);
                *entry = renewed;
                true
            }
            _ => false,
        }
    }
}
