//! Benchmark Report
//!
//! Raw timings only: per-worker elapsed time and the run's total wall time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::serde_secs;
use super::worker::WorkerResult;
use crate::partition::{BinId, Heuristic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All disjoint workers at once
    Concurrent,
    /// One disjoint worker at a time (contention-free baseline)
    Serialized,
    /// All workers at once, each also reading sampled extra bins
    Overlapping,
}

impl ExecutionMode {
    pub fn from_serialized(serialized: bool) -> Self {
        if serialized {
            ExecutionMode::Serialized
        } else {
            ExecutionMode::Concurrent
        }
    }
}

/// Immutable result of one harness run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    mode: ExecutionMode,
    heuristic: Heuristic,
    #[serde(skip_serializing_if = "Option::is_none")]
    percent_overlap: Option<f64>,
    worker_count: usize,
    started_at: DateTime<Utc>,
    #[serde(with = "serde_secs")]
    total_time: Duration,
    /// Completion order (concurrent) or assignment order (serialized)
    workers: Vec<WorkerResult>,
}

impl BenchmarkReport {
    pub(crate) fn new(
        mode: ExecutionMode,
        heuristic: Heuristic,
        percent_overlap: Option<f64>,
        started_at: DateTime<Utc>,
        total_time: Duration,
        workers: Vec<WorkerResult>,
    ) -> Self {
        Self {
            mode,
            heuristic,
            percent_overlap,
            worker_count: workers.len(),
            started_at,
            total_time,
            workers,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    pub fn percent_overlap(&self) -> Option<f64> {
        self.percent_overlap
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall time of the whole run as measured by the coordinator
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    pub fn workers(&self) -> &[WorkerResult] {
        &self.workers
    }

    /// Per-worker elapsed times in report order
    pub fn thread_timings(&self) -> Vec<Duration> {
        self.workers.iter().map(|w| w.elapsed).collect()
    }

    /// Sum of per-worker elapsed times
    pub fn summed_worker_time(&self) -> Duration {
        self.workers.iter().map(|w| w.elapsed).sum()
    }

    pub fn rows_processed(&self) -> u64 {
        self.workers.iter().map(|w| w.rows).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &WorkerResult> {
        self.workers.iter().filter(|w| w.failed())
    }

    pub fn failed_bins(&self) -> Vec<BinId> {
        let mut bins: Vec<BinId> = self.failures().map(|w| w.bin_id).collect();
        bins.sort_unstable();
        bins
    }

    pub fn succeeded(&self) -> usize {
        self.worker_count - self.failures().count()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::worker::WorkerFailure;

    fn result(bin_id: BinId, ms: u64, rows: u64, error: Option<WorkerFailure>) -> WorkerResult {
        WorkerResult {
            bin_id,
            elapsed: Duration::from_millis(ms),
            rows,
            error,
        }
    }

    fn report() -> BenchmarkReport {
        BenchmarkReport::new(
            ExecutionMode::Concurrent,
            Heuristic(0),
            None,
            Utc::now(),
            Duration::from_millis(40),
            vec![
                result(2, 30, 10, None),
                result(0, 20, 10, None),
                result(1, 0, 0, Some(WorkerFailure::Query("lock wait".to_string()))),
            ],
        )
    }

    #[test]
    fn test_aggregates() {
        let report = report();
        assert_eq!(report.worker_count(), 3);
        assert_eq!(report.rows_processed(), 20);
        assert_eq!(report.summed_worker_time(), Duration::from_millis(50));
        assert_eq!(
            report.thread_timings(),
            vec![
                Duration::from_millis(30),
                Duration::from_millis(20),
                Duration::ZERO
            ]
        );
    }

    #[test]
    fn test_failures_enumerated() {
        let report = report();
        assert_eq!(report.failed_bins(), vec![1]);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["mode"], "concurrent");
        assert_eq!(json["worker_count"], 3);
        assert_eq!(json["heuristic"], 0);
        assert!(json.get("percent_overlap").is_none());
        assert!((json["total_time"].as_f64().unwrap() - 0.04).abs() < 1e-9);
        assert_eq!(json["workers"][2]["error"]["kind"], "query");
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(ExecutionMode::from_serialized(true), ExecutionMode::Serialized);
        assert_eq!(ExecutionMode::from_serialized(false), ExecutionMode::Concurrent);
    }
}
