//! Key Lock Registry Module
//!
//! Per-key async mutexes created on demand for single-flight loading.
//! A slot counts the tasks holding or queued on its mutex; the count is
//! only changed under the map's shard lock and the slot is dropped when it
//! reaches zero.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
struct LockSlot {
    mutex: Arc<Mutex<()>>,
    /// Tasks holding or waiting on `mutex`
    waiters: usize,
}

impl LockSlot {
    fn new() -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
            waiters: 0,
        }
    }
}

// == Key Lock Registry ==
/// Registry of lazily created per-key locks.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    slots: DashMap<String, LockSlot>,
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Lock ==
    /// Waits for exclusive ownership of `key`.
    ///
    /// The returned guard unlocks on drop and removes the slot once nobody
    /// else holds or awaits it. Dropping the future while it waits also
    /// unregisters the caller.
    pub async fn lock(&self, key: &str) -> KeyLockGuard<'_> {
        let mutex = self.register(key);
        let mut guard = KeyLockGuard {
            registry: self,
            key: key.to_owned(),
            held: None,
        };
        guard.held = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of keys with a live lock slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Tasks holding or queued on `key`'s lock.
    pub fn waiters(&self, key: &str) -> usize {
        self.slots.get(key).map_or(0, |slot| slot.waiters)
    }

    fn register(&self, key: &str) -> Arc<Mutex<()>> {
        let mut slot = self
            .slots
            .entry(key.to_owned())
            .or_insert_with(LockSlot::new);
        slot.waiters += 1;
        Arc::clone(&slot.mutex)
    }

    fn release(&self, key: &str) {
        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                debug_assert!(slot.waiters > 0, "lock slot '{}' has no waiters", key);
                slot.waiters = slot.waiters.saturating_sub(1);
                if slot.waiters == 0 {
                    occupied.remove();
                }
            }
            Entry::Vacant(_) => {
                debug_assert!(false, "lock for '{}' released without being registered", key);
            }
        }
    }
}

// == Key Lock Guard ==
/// Exclusive hold on one key's lock.
#[derive(Debug)]
pub struct KeyLockGuard<'a> {
    registry: &'a KeyLockRegistry,
    key: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl KeyLockGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        // Unlock before unregistering so a queued task can proceed
        drop(self.held.take());
        self.registry.release(&self.key);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_creates_and_removes_slot() {
        let registry = KeyLockRegistry::new();

        {
            let guard = registry.lock("q:1").await;
            assert_eq!(guard.key(), "q:1");
            assert_eq!(registry.len(), 1);
            assert_eq!(registry.waiters("q:1"), 1);
        }

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let registry = KeyLockRegistry::new();

        let _a = registry.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), registry.lock("b")).await;

        assert!(b.is_ok(), "lock on another key should not wait");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let registry = Arc::new(KeyLockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock("hot").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty(), "slot should be removed after last release");
    }

    #[tokio::test]
    async fn test_slot_survives_while_waiter_queued() {
        let registry = Arc::new(KeyLockRegistry::new());
        let guard = registry.lock("k").await;

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _guard = registry.lock("k").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.waiters("k"), 2);

        drop(guard);
        assert_eq!(registry.len(), 1, "queued waiter keeps the slot alive");

        waiter.await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_unregisters() {
        let registry = Arc::new(KeyLockRegistry::new());
        let guard = registry.lock("k").await;

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _guard = registry.lock("k").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(registry.waiters("k"), 1);
        drop(guard);
        assert!(registry.is_empty());
    }
}
