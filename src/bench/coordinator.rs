//! Benchmark Coordinator
//!
//! Fan-out / fan-in over a [`PartitionPlan`]. Every worker gets its own
//! connection before the clock starts. Results come back by value from each
//! spawned task; nothing is shared between workers.
//!
//! - Concurrent / overlapping: spawn all workers, then gather in completion
//!   order. Total time spans first spawn to last completion.
//! - Serialized: spawn and await one worker at a time. Total time is the
//!   sequential span, so it is never less than the summed worker times.

use chrono::Utc;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::report::{BenchmarkReport, ExecutionMode};
use super::worker::{BenchmarkWorker, WorkerFailure, WorkerResult};
use crate::partition::{BinId, PartitionPlan};
use crate::store::PartitionStore;

pub struct BenchmarkCoordinator {
    store: Arc<dyn PartitionStore>,
    query_timeout: Option<Duration>,
}

impl BenchmarkCoordinator {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self {
            store,
            query_timeout: None,
        }
    }

    /// Bound each worker's query; expiry is recorded as a worker failure
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Disjoint partitions, concurrently or one at a time
    pub async fn run_partitioned(&self, plan: PartitionPlan, serialized: bool) -> BenchmarkReport {
        let mode = ExecutionMode::from_serialized(serialized);
        let heuristic = plan.heuristic();
        let (workers, mut results) = self.connect_workers(plan).await;

        let started_at = Utc::now();
        let start = Instant::now();
        let completed = if serialized {
            run_serialized(workers).await
        } else {
            run_concurrent(workers).await
        };
        let total_time = start.elapsed();

        results.extend(completed);
        let report =
            BenchmarkReport::new(mode, heuristic, None, started_at, total_time, results);
        self.log_summary(&report);
        report
    }

    /// Overlapping partitions; always concurrent
    pub async fn run_overlapping(&self, plan: PartitionPlan, percent_overlap: f64) -> BenchmarkReport {
        let heuristic = plan.heuristic();
        let (workers, mut results) = self.connect_workers(plan).await;

        let started_at = Utc::now();
        let start = Instant::now();
        let completed = run_concurrent(workers).await;
        let total_time = start.elapsed();

        results.extend(completed);
        let report = BenchmarkReport::new(
            ExecutionMode::Overlapping,
            heuristic,
            Some(percent_overlap),
            started_at,
            total_time,
            results,
        );
        self.log_summary(&report);
        report
    }

    /// One dedicated connection per partition. Connect failures become
    /// not-started results instead of aborting the run.
    async fn connect_workers(
        &self,
        plan: PartitionPlan,
    ) -> (Vec<BenchmarkWorker>, Vec<WorkerResult>) {
        let store = self.store.as_ref();
        let connects = plan.into_partitions().into_iter().map(|partition| {
            BenchmarkWorker::connect(store, partition.bin_id, partition.query.into())
        });

        let mut workers = Vec::new();
        let mut failed = Vec::new();
        for outcome in futures::future::join_all(connects).await {
            match outcome {
                Ok(worker) => workers.push(worker.with_timeout(self.query_timeout)),
                Err(result) => failed.push(result),
            }
        }
        (workers, failed)
    }

    fn log_summary(&self, report: &BenchmarkReport) {
        info!(
            mode = ?report.mode(),
            heuristic = report.heuristic().index(),
            workers = report.worker_count(),
            failed = report.worker_count() - report.succeeded(),
            rows = report.rows_processed(),
            total_ms = report.total_time().as_secs_f64() * 1000.0,
            summed_ms = report.summed_worker_time().as_secs_f64() * 1000.0,
            "Benchmark run finished on {}",
            self.store.name()
        );
        for failure in report.failures() {
            if let Some(error) = &failure.error {
                warn!(bin_id = failure.bin_id, "Partition failed: {}", error);
            }
        }
    }
}

fn aborted(bin_id: BinId, e: tokio::task::JoinError) -> WorkerResult {
    WorkerResult::not_started(bin_id, WorkerFailure::Aborted(e.to_string()))
}

/// Spawn everything, then gather in completion order
async fn run_concurrent(workers: Vec<BenchmarkWorker>) -> Vec<WorkerResult> {
    let mut join_set = JoinSet::new();
    let mut bins = FxHashMap::default();
    for worker in workers {
        let bin_id = worker.bin_id();
        let handle = join_set.spawn(worker.run());
        bins.insert(handle.id(), bin_id);
    }

    let mut results = Vec::with_capacity(bins.len());
    while let Some(joined) = join_set.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                let bin_id = bins.get(&e.id()).copied().unwrap_or_default();
                aborted(bin_id, e)
            }
        };
        results.push(result);
    }
    results
}

/// Start and fully join each worker before the next
async fn run_serialized(workers: Vec<BenchmarkWorker>) -> Vec<WorkerResult> {
    let mut results = Vec::with_capacity(workers.len());
    for worker in workers {
        let bin_id = worker.bin_id();
        let result = tokio::spawn(worker.run())
            .await
            .unwrap_or_else(|e| aborted(bin_id, e));
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{Heuristic, TableTarget};
    use crate::store::MemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const LATENCY: Duration = Duration::from_millis(30);

    fn keys() -> Vec<String> {
        (0..100).map(|i| format!("A{}", i)).collect()
    }

    fn plan() -> PartitionPlan {
        PartitionPlan::disjoint(
            TableTarget::new("keys", "k").unwrap(),
            Heuristic(0),
            &Heuristic::default_candidates(),
        )
    }

    fn coordinator(store: &MemoryStore) -> BenchmarkCoordinator {
        BenchmarkCoordinator::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_concurrent_run_reads_every_row_once() {
        let store = MemoryStore::new().with_table("keys", keys());
        let report = coordinator(&store).run_partitioned(plan(), false).await;

        assert_eq!(report.mode(), ExecutionMode::Concurrent);
        assert_eq!(report.worker_count(), 10);
        assert_eq!(report.rows_processed(), 100);
        assert!(report.workers().iter().all(|w| w.rows == 10));
        assert!(report.is_complete());

        let mut bins: Vec<BinId> = report.workers().iter().map(|w| w.bin_id).collect();
        bins.sort_unstable();
        assert_eq!(bins, (0..10).collect::<Vec<BinId>>());

        assert_eq!(store.opened_connections(), 10);
        assert_eq!(store.closed_connections(), 10);
    }

    #[tokio::test]
    async fn test_serialized_total_covers_sum() {
        let store = MemoryStore::new()
            .with_table("keys", keys())
            .with_query_latency(LATENCY);
        let report = coordinator(&store).run_partitioned(plan(), true).await;

        assert_eq!(report.mode(), ExecutionMode::Serialized);
        assert!(report.total_time() >= report.summed_worker_time());
        assert!(report.total_time() >= LATENCY * 10);
        // Assignment order
        let bins: Vec<BinId> = report.workers().iter().map(|w| w.bin_id).collect();
        assert_eq!(bins, (0..10).collect::<Vec<BinId>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_total_below_sum() {
        let store = MemoryStore::new()
            .with_table("keys", keys())
            .with_query_latency(LATENCY);
        let report = coordinator(&store).run_partitioned(plan(), false).await;

        assert!(report.workers().iter().all(|w| w.elapsed >= LATENCY));
        assert!(report.total_time() < report.summed_worker_time());
    }

    #[tokio::test]
    async fn test_one_failing_partition_does_not_abort_others() {
        let store = MemoryStore::new()
            .with_table("keys", keys())
            .with_failing_bin(5);
        let report = coordinator(&store).run_partitioned(plan(), false).await;

        assert_eq!(report.worker_count(), 10);
        assert_eq!(report.failed_bins(), vec![5]);
        assert_eq!(report.succeeded(), 9);
        assert_eq!(report.rows_processed(), 90);
        // Failed worker's connection was still released
        assert_eq!(store.closed_connections(), 10);
    }

    #[tokio::test]
    async fn test_connect_failures_are_reported_per_worker() {
        let store = MemoryStore::new().refusing_connections();
        let report = coordinator(&store).run_partitioned(plan(), true).await;

        assert_eq!(report.worker_count(), 10);
        assert_eq!(report.succeeded(), 0);
        assert!(
            report
                .failures()
                .all(|w| matches!(w.error, Some(WorkerFailure::Connect(_))))
        );
    }

    #[tokio::test]
    async fn test_timeout_applies_to_every_worker() {
        let store = MemoryStore::new()
            .with_table("keys", keys())
            .with_query_latency(Duration::from_millis(200));
        let report = coordinator(&store)
            .with_query_timeout(Some(Duration::from_millis(5)))
            .run_partitioned(plan(), false)
            .await;

        assert_eq!(report.failed_bins().len(), 10);
        assert!(
            report
                .failures()
                .all(|w| matches!(w.error, Some(WorkerFailure::Timeout(_))))
        );
    }

    #[tokio::test]
    async fn test_overlapping_full_reads_whole_table_per_worker() {
        let store = MemoryStore::new().with_table("keys", keys());
        let mut rng = StdRng::seed_from_u64(11);
        let plan = PartitionPlan::overlapping(
            TableTarget::new("keys", "k").unwrap(),
            Heuristic(0),
            &Heuristic::default_candidates(),
            1.0,
            &mut rng,
        )
        .unwrap();

        let report = coordinator(&store).run_overlapping(plan, 1.0).await;
        assert_eq!(report.mode(), ExecutionMode::Overlapping);
        assert_eq!(report.percent_overlap(), Some(1.0));
        assert!(report.workers().iter().all(|w| w.rows == 100));
    }

    #[tokio::test]
    async fn test_overlapping_zero_matches_disjoint_rows() {
        let store = MemoryStore::new().with_table("keys", keys());
        let mut rng = StdRng::seed_from_u64(3);
        let plan = PartitionPlan::overlapping(
            TableTarget::new("keys", "k").unwrap(),
            Heuristic(0),
            &Heuristic::default_candidates(),
            0.0,
            &mut rng,
        )
        .unwrap();

        let report = coordinator(&store).run_overlapping(plan, 0.0).await;
        assert_eq!(report.rows_processed(), 100);
        assert!(report.workers().iter().all(|w| w.rows == 10));
    }
}
