//! End-to-end harness runs against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use partition_bench::partition::build_partition_query;
use partition_bench::{
    BenchmarkHarness, ExecutionMode, HarnessError, HarnessSettings, Heuristic, MemoryStore,
    Query, QueryKind, RunPhase, TableTarget, WorkerFailure, extract_bin,
};

fn sequential_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("A{}", i)).collect()
}

/// Last digit is 0 for 97 keys and 1 for 3; second-to-last digit is uniform
fn skewed_last_digit() -> Vec<String> {
    (0..100)
        .map(|i| format!("K{}{}", i % 10, if i < 97 { 0 } else { 1 }))
        .collect()
}

#[tokio::test]
async fn test_hundred_keys_ten_workers() {
    let store = MemoryStore::new().with_table("events", sequential_keys(100));
    let mut harness = BenchmarkHarness::new(Arc::new(store.clone()));

    let heuristic = harness.select_heuristic("events", "id", 0.05).await.unwrap();
    assert_eq!(heuristic, Heuristic(0));

    let report = harness.run_partitioned("events", "id", false).await.unwrap();
    assert_eq!(report.heuristic(), Heuristic(0));
    assert_eq!(report.worker_count(), 10);
    assert_eq!(report.thread_timings().len(), 10);
    assert_eq!(report.rows_processed(), 100);
    assert!(report.is_complete());
    assert_eq!(harness.phase(), RunPhase::Done);

    assert_eq!(store.opened_connections(), store.closed_connections());
}

#[tokio::test]
async fn test_selector_skips_skewed_heuristic() {
    let store = MemoryStore::new().with_table("events", skewed_last_digit());
    let mut harness = BenchmarkHarness::new(Arc::new(store));

    let report = harness.run_partitioned("events", "id", false).await.unwrap();
    assert_eq!(report.heuristic(), Heuristic(1));
    assert!(report.workers().iter().all(|w| w.rows == 10));
}

#[tokio::test]
async fn test_strict_fraction_fails_selection() {
    let store = MemoryStore::new().with_table("events", skewed_last_digit());
    let settings = HarnessSettings {
        candidates: vec![Heuristic(0)],
        ..Default::default()
    };
    let mut harness = BenchmarkHarness::with_settings(Arc::new(store), settings).unwrap();

    match harness.run_partitioned("events", "id", false).await {
        Err(HarnessError::Selection(failure)) => {
            assert_eq!(failure.reason, "no heuristic meets minimum bin proportion");
            assert_eq!(failure.candidates_tried, 1);
        }
        other => panic!("expected selection failure, got {:?}", other.map(|r| r.mode())),
    }
    assert_eq!(harness.phase(), RunPhase::SelectionFailed);
}

#[test]
fn test_partitions_are_disjoint_and_exhaustive() {
    let target = TableTarget::new("events", "id").unwrap();
    let keys: Vec<String> = sequential_keys(250)
        .into_iter()
        .chain(["", "x", "12ab", "7"].map(String::from))
        .collect();

    for h in Heuristic::default_candidates() {
        let queries: Vec<_> = (0..10)
            .map(|bin| build_partition_query(&target, h, bin, &[]))
            .collect();
        for key in &keys {
            let owners: Vec<_> = queries.iter().filter(|q| q.matches(key)).collect();
            assert_eq!(owners.len(), 1, "key {:?} under {}", key, h);
            assert_eq!(owners[0].bin_id, extract_bin(key, h));
        }
    }
}

#[tokio::test]
async fn test_serialized_run_reports_sequential_span() {
    let store = MemoryStore::new()
        .with_table("events", sequential_keys(100))
        .with_query_latency(Duration::from_millis(10));
    let mut harness = BenchmarkHarness::new(Arc::new(store));

    let report = harness.run_partitioned("events", "id", true).await.unwrap();
    assert_eq!(report.mode(), ExecutionMode::Serialized);
    assert!(report.total_time() >= report.summed_worker_time());

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["workers"].as_array().map(Vec::len), Some(10));
}

#[tokio::test]
async fn test_failed_partition_is_reported_not_raised() {
    let store = MemoryStore::new()
        .with_table("events", sequential_keys(100))
        .with_failing_bin(3);
    let mut harness = BenchmarkHarness::new(Arc::new(store.clone()));

    let report = harness.run_partitioned("events", "id", false).await.unwrap();
    assert_eq!(report.failed_bins(), vec![3]);
    assert!(matches!(
        report.failures().next().and_then(|w| w.error.as_ref()),
        Some(WorkerFailure::Query(_))
    ));
    assert_eq!(report.rows_processed(), 90);
    assert_eq!(store.opened_connections(), store.closed_connections());
}

#[tokio::test]
async fn test_full_overlap_reads_whole_table() {
    let store = MemoryStore::new().with_table("events", sequential_keys(100));
    let settings = HarnessSettings {
        overlap_seed: Some(7),
        ..Default::default()
    };
    let mut harness = BenchmarkHarness::with_settings(Arc::new(store), settings).unwrap();

    let report = harness.run_overlapping("events", "id", 1.0).await.unwrap();
    assert_eq!(report.mode(), ExecutionMode::Overlapping);
    assert_eq!(report.worker_count(), 10);
    assert_eq!(report.rows_processed(), 1000);
}

#[tokio::test]
async fn test_stress_and_single_query() {
    let store = MemoryStore::new().with_table("events", sequential_keys(100));
    let harness = BenchmarkHarness::new(Arc::new(store.clone()));

    let stress = harness.connection_stress_test(5).await.unwrap();
    assert_eq!(stress.connections, 5);

    let target = TableTarget::new("events", "id").unwrap();
    let query: Query = build_partition_query(&target, Heuristic(0), 4, &[]).into();
    let timing = harness
        .time_query(&query, QueryKind::Fetch)
        .await
        .unwrap();
    assert_eq!(timing.rows, 10);
    assert_eq!(store.opened_connections(), 6);
    assert_eq!(store.closed_connections(), 6);
}
