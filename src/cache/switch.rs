//! Cache Switch Module
//!
//! The "is caching enabled" collaborator. The engine polls it at the start
//! of every public operation, so flips take effect immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of the runtime caching switch.
pub trait CacheSwitch: Send + Sync {
    fn is_enabled(&self) -> bool;
}

impl CacheSwitch for AtomicBool {
    fn is_enabled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: CacheSwitch + ?Sized> CacheSwitch for Arc<T> {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// Adapts any thread-safe predicate, e.g. a lookup in an application config.
pub struct SwitchFn<F>(pub F);

impl<F> CacheSwitch for SwitchFn<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_enabled(&self) -> bool {
        (self.0)()
    }
}
