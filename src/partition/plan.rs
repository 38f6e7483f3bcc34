//! Partition Plan
//!
//! One partition per candidate index, regardless of which heuristic won.
//! In the overlapping variant every partition also reads a random sample of
//! the other bins. Sampling is non-deterministic unless the caller passes a
//! seeded RNG.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::heuristic::{BinId, Heuristic};
use super::query::{PartitionQuery, TableTarget, build_partition_query};
use crate::error::ConfigurationError;

/// Number of extra bins each overlapping partition reads:
/// `round(percent_overlap * candidate_count)`, capped at the other bins.
pub fn overlap_size(percent_overlap: f64, candidate_count: usize) -> usize {
    let wanted = (percent_overlap * candidate_count as f64).round() as usize;
    wanted.min(candidate_count.saturating_sub(1))
}

/// Sample `size` bins from `bin_ids` without replacement, never `own`
pub fn sample_extra_bins<R: Rng + ?Sized>(
    own: BinId,
    bin_ids: &[BinId],
    size: usize,
    rng: &mut R,
) -> Vec<BinId> {
    let others: Vec<BinId> = bin_ids.iter().copied().filter(|&b| b != own).collect();
    others.choose_multiple(rng, size).copied().collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Partition {
    pub bin_id: BinId,
    pub query: PartitionQuery,
}

/// Immutable once built; consumed by one coordinator run
#[derive(Debug, Clone, Serialize)]
pub struct PartitionPlan {
    target: TableTarget,
    heuristic: Heuristic,
    partitions: Vec<Partition>,
}

impl PartitionPlan {
    /// Non-overlapping partitions, one per candidate
    pub fn disjoint(target: TableTarget, heuristic: Heuristic, candidates: &[Heuristic]) -> Self {
        let partitions = bin_ids_of(candidates)
            .into_iter()
            .map(|bin_id| Partition {
                bin_id,
                query: build_partition_query(&target, heuristic, bin_id, &[]),
            })
            .collect();

        Self {
            target,
            heuristic,
            partitions,
        }
    }

    /// Partitions that also read a random sample of other bins
    pub fn overlapping<R: Rng + ?Sized>(
        target: TableTarget,
        heuristic: Heuristic,
        candidates: &[Heuristic],
        percent_overlap: f64,
        rng: &mut R,
    ) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&percent_overlap) {
            return Err(ConfigurationError::OverlapOutOfRange(percent_overlap));
        }

        let bin_ids = bin_ids_of(candidates);
        let size = overlap_size(percent_overlap, bin_ids.len());
        let partitions = bin_ids
            .iter()
            .map(|&bin_id| {
                let extras = sample_extra_bins(bin_id, &bin_ids, size, rng);
                Partition {
                    bin_id,
                    query: build_partition_query(&target, heuristic, bin_id, &extras),
                }
            })
            .collect();

        Ok(Self {
            target,
            heuristic,
            partitions,
        })
    }

    pub fn target(&self) -> &TableTarget {
        &self.target
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn bin_ids(&self) -> Vec<BinId> {
        self.partitions.iter().map(|p| p.bin_id).collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn into_partitions(self) -> Vec<Partition> {
        self.partitions
    }
}

fn bin_ids_of(candidates: &[Heuristic]) -> Vec<BinId> {
    let mut ids: Vec<BinId> = candidates.iter().map(|h| h.index()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
