//! partition_bench - Concurrent Data-Partitioning Benchmark Harness
//!
//! Splits a table into disjoint (or deliberately overlapping) partitions by a
//! digit of its key, reads each partition on its own connection, and reports
//! per-worker and total wall-clock timings.
//!
//! # Modules
//!
//! - [`partition`] - Heuristics, bin balance, partition queries and plans
//! - [`store`] - Store collaborator traits, PostgreSQL and in-memory stores
//! - [`bench`] - Workers, coordinator, reports, run phases, stress tests
//! - [`harness`] - Caller-facing benchmark API
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`error`] - Harness error types

pub mod bench;
pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod partition;
pub mod store;

// Convenient re-exports at crate root
pub use bench::{
    BenchmarkCoordinator, BenchmarkReport, ConnectionStressReport, ExecutionMode, QueryKind,
    QueryTiming, RunPhase, WorkerFailure, WorkerResult, WorkerStatus,
};
pub use config::AppConfig;
pub use error::{ConfigurationError, HarnessError, SelectionFailure};
pub use harness::{BenchmarkHarness, HarnessSettings};
pub use partition::{
    BinCounts, BinId, Heuristic, PartitionPlan, PartitionQuery, Query, TableTarget, extract_bin,
    is_balanced,
};
pub use store::{MemoryStore, PartitionStore, PgStore, StoreConnection, StoreError};
