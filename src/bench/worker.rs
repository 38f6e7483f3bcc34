//! Benchmark Worker
//!
//! Owns one dedicated connection and runs exactly one query on it. Only the
//! query itself is timed; connect and close are outside the measured span.
//! A failing query is recorded in the result, never propagated.

use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::serde_secs;
use crate::partition::{BinId, Query};
use crate::store::{PartitionStore, StoreConnection};

/// Why a single worker produced no measurement
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WorkerFailure {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("query exceeded timeout of {0:?}")]
    Timeout(#[serde(with = "serde_secs")] Duration),

    #[error("worker task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerResult {
    pub bin_id: BinId,
    #[serde(with = "serde_secs")]
    pub elapsed: Duration,
    pub rows: u64,
    pub error: Option<WorkerFailure>,
}

impl WorkerResult {
    /// A worker that never got to run its query
    pub fn not_started(bin_id: BinId, error: WorkerFailure) -> Self {
        Self {
            bin_id,
            elapsed: Duration::ZERO,
            rows: 0,
            error: Some(error),
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn status(&self) -> WorkerStatus {
        if self.failed() {
            WorkerStatus::Failed
        } else {
            WorkerStatus::Completed
        }
    }
}

pub struct BenchmarkWorker {
    bin_id: BinId,
    query: Query,
    connection: Box<dyn StoreConnection>,
    timeout: Option<Duration>,
}

impl BenchmarkWorker {
    pub fn new(bin_id: BinId, connection: Box<dyn StoreConnection>, query: Query) -> Self {
        Self {
            bin_id,
            query,
            connection,
            timeout: None,
        }
    }

    /// Open the worker's dedicated connection
    pub async fn connect(
        store: &dyn PartitionStore,
        bin_id: BinId,
        query: Query,
    ) -> Result<Self, WorkerResult> {
        match store.connect().await {
            Ok(connection) => Ok(Self::new(bin_id, connection, query)),
            Err(e) => {
                warn!(bin_id, "Worker could not connect: {}", e);
                Err(WorkerResult::not_started(
                    bin_id,
                    WorkerFailure::Connect(e.to_string()),
                ))
            }
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bin_id(&self) -> BinId {
        self.bin_id
    }

    /// Execute the query and release the connection on every path
    pub async fn run(self) -> WorkerResult {
        let Self {
            bin_id,
            query,
            mut connection,
            timeout,
        } = self;

        debug!(bin_id, "Worker starting");
        let start = Instant::now();
        let fetch = connection.fetch_all(&query);
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result.map_err(|e| WorkerFailure::Query(e.to_string())),
                Err(_) => Err(WorkerFailure::Timeout(limit)),
            },
            None => fetch.await.map_err(|e| WorkerFailure::Query(e.to_string())),
        };
        let elapsed = start.elapsed();

        if let Err(e) = connection.close().await {
            warn!(bin_id, "Failed to release connection: {}", e);
        }

        match outcome {
            Ok(rows) => {
                debug!(
                    bin_id,
                    rows = rows.len(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Worker finished"
                );
                WorkerResult {
                    bin_id,
                    elapsed,
                    rows: rows.len() as u64,
                    error: None,
                }
            }
            Err(error) => {
                warn!(bin_id, "Worker terminating: {}", error);
                WorkerResult {
                    bin_id,
                    elapsed,
                    rows: 0,
                    error: Some(error),
                }
            }
        }
    }
}
