//! Append-only Bloom filter used to approximate distinct client counts.
//!
//! Bits live in `AtomicU64` words: `insert` and `contains` are lock-free and
//! concurrent sets never disturb unrelated bits. `check_and_insert` serializes
//! callers hashing to the same lock stripe, so two concurrent first sightings
//! of one key report "new" exactly once.
//!
//! Results are probabilistic in one direction only: a key that was inserted
//! is always reported as contained, while a key never inserted may be
//! reported as contained (false positive). There is no removal and no reset.

use std::f64::consts::LN_2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::error::{MonitorError, Result};

const SEED_PRIMARY: u64 = 0x9E37_79B9_7F4A_7C15;
const SEED_SECONDARY: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// Smallest bit array handed out by [`BloomFilter::with_capacity`].
pub const MIN_BITS: usize = 64;
/// Upper bound on hash functions per key.
pub const MAX_HASHES: usize = 32;

const LOCK_STRIPES: usize = 64;

pub struct BloomFilter {
    words: Box<[AtomicU64]>,
    num_bits: usize,
    num_hashes: usize,
    stripes: Box<[Mutex<()>]>,
}

impl BloomFilter {
    /// Build a filter with an explicit bit count `m` and hash count `k`.
    pub fn new(num_bits: usize, num_hashes: usize) -> Result<Self> {
        if num_bits == 0 {
            return Err(MonitorError::Config("bloom filter needs at least one bit".into()));
        }
        if !(1..=MAX_HASHES).contains(&num_hashes) {
            return Err(MonitorError::Config(format!(
                "bloom filter hash count must be between 1 and {MAX_HASHES}, got {num_hashes}"
            )));
        }

        let words = (0..num_bits.div_ceil(64))
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let stripes = (0..LOCK_STRIPES)
            .map(|_| Mutex::new(()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            words,
            num_bits,
            num_hashes,
            stripes,
        })
    }

    /// Size the filter for `expected_keys` distinct keys at a target
    /// false-positive rate.
    ///
    /// `m = ceil(-n ln p / (ln 2)^2)`, `k = round(m/n ln 2)` clamped to
    /// `1..=MAX_HASHES`.
    pub fn with_capacity(expected_keys: usize, fp_rate: f64) -> Result<Self> {
        if expected_keys == 0 {
            return Err(MonitorError::Config("bloom filter expected key count must be > 0".into()));
        }
        if !(fp_rate > 0.0 && fp_rate < 1.0) {
            return Err(MonitorError::Config(format!(
                "bloom filter false positive rate must be in (0, 1), got {fp_rate}"
            )));
        }

        let n = expected_keys as f64;
        let m = (-n * fp_rate.ln() / (LN_2 * LN_2)).ceil();
        if !m.is_finite() || m > (usize::MAX / 2) as f64 {
            return Err(MonitorError::Config(format!(
                "bloom filter for {expected_keys} keys at {fp_rate} does not fit in memory"
            )));
        }
        let num_bits = (m as usize).max(MIN_BITS);
        let k = ((num_bits as f64 / n) * LN_2).round() as usize;

        Self::new(num_bits, k.clamp(1, MAX_HASHES))
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// True iff every bit for `key` is set.
    pub fn contains<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> bool {
        let (h1, h2) = hash_pair(key.as_ref());
        self.positions(h1, h2).all(|pos| self.get_bit(pos))
    }

    /// Set every bit for `key`.
    pub fn insert<K: AsRef<[u8]> + ?Sized>(&self, key: &K) {
        let (h1, h2) = hash_pair(key.as_ref());
        for pos in self.positions(h1, h2) {
            self.set_bit(pos);
        }
    }

    /// Insert `key` and report whether it was absent before.
    ///
    /// Returns `false` for keys already present (or colliding with present
    /// keys). Calls for the same key are serialized, so at most one of them
    /// returns `true`.
    pub fn check_and_insert<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> bool {
        let (h1, h2) = hash_pair(key.as_ref());
        let stripe = ((h1 as u128 * LOCK_STRIPES as u128) >> 64) as usize;
        // The stripe guards no data, so a poisoned lock is still usable.
        let _guard = self.stripes[stripe]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut fresh = false;
        for pos in self.positions(h1, h2) {
            fresh |= self.set_bit(pos);
        }
        fresh
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Enhanced double hashing: `h1 + i*h2 + (i^2 + i)/2 mod m`.
    fn positions(&self, h1: u64, h2: u64) -> impl Iterator<Item = usize> {
        let m = self.num_bits as u64;
        (0..self.num_hashes as u64).map(move |i| {
            let quadratic = i.wrapping_mul(i.wrapping_add(1)) >> 1;
            let hash = h1.wrapping_add(i.wrapping_mul(h2)).wrapping_add(quadratic);
            (hash % m) as usize
        })
    }

    fn get_bit(&self, pos: usize) -> bool {
        let word = self.words[pos / 64].load(Ordering::Acquire);
        word & (1u64 << (pos % 64)) != 0
    }

    /// Returns true if the bit flipped from 0 to 1.
    fn set_bit(&self, pos: usize) -> bool {
        let mask = 1u64 << (pos % 64);
        let prev = self.words[pos / 64].fetch_or(mask, Ordering::AcqRel);
        prev & mask == 0
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .finish()
    }
}

fn hash_pair(bytes: &[u8]) -> (u64, u64) {
    // Odd stride so successive probes never collapse onto h1.
    (
        xxh3_64_with_seed(bytes, SEED_PRIMARY),
        xxh3_64_with_seed(bytes, SEED_SECONDARY) | 1,
    )
}
