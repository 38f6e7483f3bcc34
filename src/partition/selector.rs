//! Heuristic Selector
//!
//! Greedy, order-dependent: candidates are tried in ascending order and the
//! first one whose bins are all at least `min_fraction` of the total wins.

use tracing::{debug, info, warn};

use super::heuristic::{BinCounts, BinId, Heuristic, bin_threshold};
use super::query::{BinCountQuery, Query, TableTarget};
use crate::error::{ConfigurationError, HarnessError, SelectionFailure};
use crate::store::{StoreConnection, StoreError};

/// Run the bin-count aggregation for one heuristic
pub async fn fetch_bin_counts(
    conn: &mut dyn StoreConnection,
    target: &TableTarget,
    heuristic: Heuristic,
) -> Result<BinCounts, StoreError> {
    let query: Query = BinCountQuery::new(target.clone(), heuristic).into();
    let rows = conn.fetch_all(&query).await?;

    let mut counts = BinCounts::new();
    for row in rows {
        let bin = row.int(0)?;
        let count = row.int(1)?;
        let bin = BinId::try_from(bin).map_err(|_| StoreError::Decode {
            column: 0,
            message: format!("bin id {} out of range", bin),
        })?;
        counts.record(bin, count.max(0) as u64);
    }
    Ok(counts)
}

/// Accept/reject one trial. An empty table never passes a positive fraction.
pub fn accepts(counts: &BinCounts, min_fraction: f64) -> bool {
    if counts.total() == 0 && min_fraction > 0.0 {
        return false;
    }
    counts.is_balanced(min_fraction)
}

/// Return the first candidate whose bins are balanced.
///
/// `candidates` are sorted ascending before trial so the result does not
/// depend on caller ordering. Store errors abort selection.
pub async fn select_heuristic(
    conn: &mut dyn StoreConnection,
    target: &TableTarget,
    candidates: &[Heuristic],
    min_fraction: f64,
) -> Result<Heuristic, HarnessError> {
    if !(0.0..=1.0).contains(&min_fraction) {
        return Err(ConfigurationError::FractionOutOfRange(min_fraction).into());
    }
    if candidates.is_empty() {
        return Err(ConfigurationError::NoCandidates.into());
    }

    let mut ordered = candidates.to_vec();
    ordered.sort_unstable();

    for (tried, &heuristic) in ordered.iter().enumerate() {
        let counts = fetch_bin_counts(conn, target, heuristic).await?;
        let total = counts.total();
        debug!(
            heuristic = heuristic.index(),
            total,
            bins = counts.len(),
            threshold = bin_threshold(total, min_fraction),
            "Evaluated heuristic"
        );

        if accepts(&counts, min_fraction) {
            info!(
                heuristic = heuristic.index(),
                trials = tried + 1,
                "Selected heuristic for {}.{}",
                target.table(),
                target.key_field()
            );
            return Ok(heuristic);
        }
    }

    warn!(
        "No heuristic gives every bin at least {:.1}% of {}",
        min_fraction * 100.0,
        target.table()
    );
    Err(SelectionFailure::exhausted(min_fraction, ordered.len()).into())
}
