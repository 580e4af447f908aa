//! Cache Entry Module
//!
//! Defines the stored slot (value or cached absence) and its TTL/access metadata.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// == Slot ==
/// What a key maps to: a real value or a cached "no result".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<V> {
    /// Application payload
    Value(V),
    /// The loader ran and found nothing
    Absent,
}

impl<V> Slot<V> {
    /// Returns true for the negative-cache marker.
    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }

    /// Borrows the payload, if any.
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Absent => None,
        }
    }

    /// Converts to the caller-facing form: a cached absence reads as `None`.
    pub fn into_value(self) -> Option<V> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Absent => None,
        }
    }
}

impl<V> From<Option<V>> for Slot<V> {
    fn from(value: Option<V>) -> Self {
        value.map_or(Slot::Absent, Slot::Value)
    }
}

// == Cache Entry ==
/// A single stored mapping with expiry and access statistics.
///
/// `expire_at` is fixed at construction; renewing a TTL builds a new entry.
/// Access metadata is atomic so reads can update it through a shared reference.
#[derive(Debug)]
pub struct CacheEntry<V> {
    slot: Slot<V>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expire_at: u64,
    last_access_at: AtomicU64,
    access_count: AtomicU64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now.
    pub fn new(slot: Slot<V>, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            slot,
            created_at: now,
            expire_at: now.saturating_add(duration_ms(ttl)),
            last_access_at: AtomicU64::new(now),
            access_count: AtomicU64::new(0),
        }
    }

    /// Borrows the slot without counting it as an access.
    pub fn slot(&self) -> &Slot<V> {
        &self.slot
    }

    // == Read ==
    /// Returns the slot and records the access.
    pub fn read(&self) -> &Slot<V> {
        self.touch();
        &self.slot
    }

    /// Records an access without returning the slot.
    pub fn touch(&self) {
        self.last_access_at
            .store(current_timestamp_ms(), Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches `expire_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expire_at
    }

    /// True when the entry was never read and its last touch predates `cutoff_ms`.
    pub(crate) fn is_idle(&self, cutoff_ms: u64) -> bool {
        self.access_count() == 0 && self.last_access_at() < cutoff_ms
    }

    pub fn last_access_at(&self) -> u64 {
        self.last_access_at.load(Ordering::Relaxed)
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expire_at.saturating_sub(current_timestamp_ms())
    }
}

impl<V: Clone> CacheEntry<V> {
    /// Builds a replacement entry carrying the same slot with a fresh TTL.
    pub fn renewed(&self, ttl: Duration) -> Self {
        Self::new(self.slot.clone(), ttl)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(Slot::Value("test_value"), Duration::from_secs(60));

        assert_eq!(entry.slot(), &Slot::Value("test_value"));
        assert_eq!(entry.expire_at - entry.created_at, 60_000);
        assert_eq!(entry.access_count(), 0);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_read_updates_access_metadata() {
        let entry = CacheEntry::new(Slot::Value(7), Duration::from_secs(60));
        let before = entry.last_access_at();

        sleep(Duration::from_millis(5));
        assert_eq!(entry.read(), &Slot::Value(7));
        entry.read();

        assert_eq!(entry.access_count(), 2);
        assert!(entry.last_access_at() > before);
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(Slot::Value("v"), Duration::from_millis(50));
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining_ms(), 0);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new(Slot::Value("v"), Duration::ZERO);
        // Expired as soon as now reaches expire_at
        assert!(entry.is_expired_at(entry.expire_at));
        assert!(!entry.is_expired_at(entry.expire_at - 1));
    }

    #[test]
    fn test_ttl_remaining_ms() {
        let entry = CacheEntry::new(Slot::Value("v"), Duration::from_secs(10));
        let remaining = entry.ttl_remaining_ms();
        assert!(remaining <= 10_000);
        assert!(remaining >= 9_000);
    }

    #[test]
    fn test_renewed_keeps_value_and_resets_stats() {
        let entry = CacheEntry::new(Slot::Value("v".to_string()), Duration::from_secs(1));
        entry.read();

        let renewed = entry.renewed(Duration::from_secs(120));
        assert_eq!(renewed.slot(), entry.slot());
        assert_eq!(renewed.access_count(), 0);
        assert!(renewed.expire_at > entry.expire_at);
    }

    #[test]
    fn test_idle_detection() {
        let entry = CacheEntry::new(Slot::<u8>::Absent, Duration::from_secs(60));
        let later = entry.last_access_at() + 1;
        assert!(entry.is_idle(later));

        entry.touch();
        assert!(!entry.is_idle(u64::MAX));
    }

    #[test]
    fn test_slot_from_option() {
        assert_eq!(Slot::from(Some(3)), Slot::Value(3));
        assert!(Slot::<i32>::from(None).is_absent());
        assert_eq!(Slot::Value(3).as_value(), Some(&3));
        assert_eq!(Slot::Value(3).into_value(), Some(3));
        assert_eq!(Slot::<i32>::Absent.into_value(), None);
    }
}
