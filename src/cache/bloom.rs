//! Bloom Filter Module
//!
//! Fixed-size bit array answering "definitely absent" or "possibly present".

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Multipliers deriving the three probe positions from one key hash.
const PROBE_MULTIPLIERS: [u64; 3] = [
    0x9E37_79B9_7F4A_7C15,
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
];

// == Bloom Filter ==
/// Lock-free bloom filter over string keys.
///
/// Bits are set with atomic `fetch_or`, so concurrent inserts never lose
/// each other's bits. Bits are only cleared by [`BloomFilter::clear`].
#[derive(Debug)]
pub struct BloomFilter {
    words: Box<[AtomicU64]>,
    num_bits: usize,
}

impl BloomFilter {
    // == Constructor ==
    /// Creates a filter with `num_bits` bits (at least one).
    pub fn new(num_bits: usize) -> Self {
        let num_bits = num_bits.max(1);
        let words = (0..num_bits.div_ceil(64))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { words, num_bits }
    }

    // == Insert ==
    /// Marks `key` as possibly present.
    pub fn insert(&self, key: &str) {
        for bit in self.probes(key) {
            self.words[bit / 64].fetch_or(1 << (bit % 64), Ordering::Relaxed);
        }
    }

    // == Might Contain ==
    /// Returns false only if `key` was never inserted since the last clear.
    pub fn might_contain(&self, key: &str) -> bool {
        self.probes(key)
            .all(|bit| self.words[bit / 64].load(Ordering::Relaxed) & (1 << (bit % 64)) != 0)
    }

    // == Clear ==
    /// Resets every bit.
    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of bits currently set.
    pub fn set_bits(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    fn probes(&self, key: &str) -> impl Iterator<Item = usize> + '_ {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let hash = hasher.finish();
        let bits = self.num_bits as u64;

        PROBE_MULTIPLIERS
            .iter()
            .map(move |m| (hash.wrapping_mul(*m).rotate_right(29) % bits) as usize)
    }
}
