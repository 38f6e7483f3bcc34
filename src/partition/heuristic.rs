//! Partition Key Extraction and Bin Balance
//!
//! A heuristic picks one character of a string key, counted from the end,
//! and reads it as a decimal digit. The digit is the key's bin id.
//!
//! ```text
//! key = "A1234"      h=0 -> '4' -> bin 4
//!                    h=1 -> '3' -> bin 3
//!                    h=5 -> (out of range) -> bin 0
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bin identifier (0-9)
pub type BinId = u8;

/// Number of distinct bins a single decimal digit can produce
pub const BIN_COUNT: usize = 10;

/// Default minimum share of the total a bin must hold
pub const DEFAULT_MIN_BIN_FRACTION: f64 = 0.05;

/// Character position counted from the end of the key (0 = last character)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Heuristic(pub u8);

impl Heuristic {
    /// The conventional candidate set, in trial order
    pub fn default_candidates() -> Vec<Heuristic> {
        (0..BIN_COUNT as u8).map(Heuristic).collect()
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    /// Map a key to its bin under this heuristic
    #[inline]
    pub fn bin_of(self, key: &str) -> BinId {
        extract_bin(key, self)
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Deterministic key -> bin mapping.
///
/// Positions are counted in characters, not bytes. A position before the
/// start of the key, or a character that is not an ASCII digit, yields bin 0.
/// The SQL rendering in [`crate::partition::query`] follows the same rule.
pub fn extract_bin(key: &str, heuristic: Heuristic) -> BinId {
    let len = key.chars().count();
    let offset = heuristic.0 as usize;
    if offset >= len {
        return 0;
    }
    key.chars()
        .nth(len - 1 - offset)
        .and_then(|c| c.to_digit(10))
        .map(|d| d as BinId)
        .unwrap_or(0)
}

/// Observed per-bin row counts for one heuristic trial.
///
/// Only bins that actually appear in the data are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinCounts {
    counts: Vec<(BinId, u64)>,
}

impl BinCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` rows to `bin` (bins may be reported more than once)
    pub fn record(&mut self, bin: BinId, count: u64) {
        match self.counts.iter_mut().find(|(b, _)| *b == bin) {
            Some((_, c)) => *c += count,
            None => self.counts.push((bin, count)),
        }
    }

    pub fn get(&self, bin: BinId) -> Option<u64> {
        self.counts.iter().find(|(b, _)| *b == bin).map(|(_, c)| *c)
    }

    /// Grand total across observed bins
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    pub fn counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.counts.iter().map(|(_, c)| *c)
    }

    pub fn bins(&self) -> impl Iterator<Item = BinId> + '_ {
        self.counts.iter().map(|(b, _)| *b)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Evaluate these counts against their own total
    pub fn is_balanced(&self, min_fraction: f64) -> bool {
        let counts: Vec<u64> = self.counts().collect();
        is_balanced(&counts, self.total(), min_fraction)
    }
}

impl FromIterator<(BinId, u64)> for BinCounts {
    fn from_iter<I: IntoIterator<Item = (BinId, u64)>>(iter: I) -> Self {
        let mut counts = BinCounts::new();
        for (bin, count) in iter {
            counts.record(bin, count);
        }
        counts
    }
}

/// Minimum count a bin needs: `floor(min_fraction * total)`
#[inline]
pub fn bin_threshold(total: u64, min_fraction: f64) -> u64 {
    (min_fraction * total as f64).floor() as u64
}

/// True when no bin falls below `floor(min_fraction * total)`.
///
/// An empty bin list is balanced only when the threshold is 0.
pub fn is_balanced(bin_counts: &[u64], total: u64, min_fraction: f64) -> bool {
    let threshold = bin_threshold(total, min_fraction);
    if bin_counts.is_empty() {
        return threshold == 0;
    }
    bin_counts.iter().all(|&count| count >= threshold)
}
