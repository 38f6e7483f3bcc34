//! Partitioning
//!
//! - [`heuristic`] - key -> bin extraction and the balance check
//! - [`selector`] - first-fit heuristic search against the store
//! - [`query`] - per-partition query construction
//! - [`plan`] - the full set of partition queries for one run

pub mod heuristic;
pub mod plan;
pub mod query;
pub mod selector;

pub use heuristic::{
    BIN_COUNT, BinCounts, BinId, DEFAULT_MIN_BIN_FRACTION, Heuristic, extract_bin, is_balanced,
};
pub use plan::{Partition, PartitionPlan, overlap_size, sample_extra_bins};
pub use query::{BinCountQuery, PartitionQuery, Query, TableTarget, build_partition_query};
pub use selector::{fetch_bin_counts, select_heuristic};
