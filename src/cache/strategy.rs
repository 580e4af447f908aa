//! Cache Strategy Module
//!
//! Named TTL tiers for data with different rates of change.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// TTL tier for a family of cached data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Frequently changing data, 5 minutes
    Short,
    /// Ordinary business data, 30 minutes
    #[default]
    Medium,
    /// Fairly stable data, 2 hours
    Long,
    /// Reference/configuration data, 24 hours
    Persistent,
}

impl CacheStrategy {
    pub const fn ttl(self) -> Duration {
        let minutes = match self {
            CacheStrategy::Short => 5,
            CacheStrategy::Medium => 30,
            CacheStrategy::Long => 120,
            CacheStrategy::Persistent => 1440,
        };
        Duration::from_secs(minutes * 60)
    }
}
