//! Error types for the cache engine
//!
//! Misses are never errors; these cover the few operations that can fail.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The stored value cannot be read or written as an integer counter
    #[error("Value under key '{0}' is not a counter")]
    NotACounter(String),

    /// Counter arithmetic left the i64 range
    #[error("Counter overflow on key '{0}'")]
    CounterOverflow(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
