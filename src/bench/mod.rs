//! Benchmark Execution
//!
//! # Components
//!
//! - [`worker`] - one connection, one query, one timing
//! - [`coordinator`] - fan-out/fan-in over a partition plan
//! - [`report`] - aggregated timings
//! - [`phase`] - run state machine
//! - [`stress`] - connection stress test and single-query timing

pub mod coordinator;
pub mod phase;
pub mod report;
pub mod stress;
pub mod worker;

pub use coordinator::BenchmarkCoordinator;
pub use phase::{PhaseTracker, RunPhase};
pub use report::{BenchmarkReport, ExecutionMode};
pub use stress::{ConnectionStressReport, QueryKind, QueryTiming};
pub use worker::{BenchmarkWorker, WorkerFailure, WorkerResult, WorkerStatus};

/// `Duration` as fractional seconds
pub(crate) mod serde_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
