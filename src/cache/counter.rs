//! Counter Values
//!
//! Value types that `Cache::increment` can treat as an integer counter.

/// A cache value readable and writable as an `i64` counter.
pub trait CounterValue: Sized {
    /// Reads the counter, or `None` if the value is not numeric.
    fn to_counter(&self) -> Option<i64>;

    fn from_counter(value: i64) -> Self;
}

impl CounterValue for i64 {
    fn to_counter(&self) -> Option<i64> {
        Some(*self)
    }

    fn from_counter(value: i64) -> Self {
        value
    }
}

impl CounterValue for String {
    fn to_counter(&self) -> Option<i64> {
        self.trim().parse().ok()
    }

    fn from_counter(value: i64) -> Self {
        value.to_string()
    }
}

impl CounterValue for serde_json::Value {
    fn to_counter(&self) -> Option<i64> {
        match self {
            serde_json::Value::Number(number) => number.as_i64(),
            serde_json::Value::String(text) => text.to_counter(),
            _ => None,
        }
    }

    fn from_counter(value: i64) -> Self {
        serde_json::Value::from(value)
    }
}
