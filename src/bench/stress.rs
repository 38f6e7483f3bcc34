//! Connection Stress and Single-Query Timing

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

use super::serde_secs;
use crate::partition::Query;
use crate::store::{PartitionStore, StoreError};

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStressReport {
    pub connections: usize,
    #[serde(with = "serde_secs")]
    pub total_time: Duration,
    #[serde(with = "serde_secs")]
    pub mean_time: Duration,
}

/// Open and close `level` connections back to back.
///
/// The first failed connect aborts the test.
pub async fn connection_stress_test(
    store: &dyn PartitionStore,
    level: usize,
) -> Result<ConnectionStressReport, StoreError> {
    let start = Instant::now();
    for _ in 0..level {
        let conn = store.connect().await?;
        conn.close().await?;
    }
    let total_time = start.elapsed();
    let mean_time = mean_duration(total_time, level);

    info!(
        connections = level,
        total_ms = total_time.as_secs_f64() * 1000.0,
        mean_ms = mean_time.as_secs_f64() * 1000.0,
        "Connection stress test finished on {}",
        store.name()
    );
    Ok(ConnectionStressReport {
        connections: level,
        total_time,
        mean_time,
    })
}

fn mean_duration(total: Duration, count: usize) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        total.div_f64(count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Execute and read back every row
    Fetch,
    /// Execute in a transaction and commit
    Commit,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryTiming {
    pub kind: QueryKind,
    pub sql: String,
    /// Rows returned (fetch) or affected (commit)
    pub rows: u64,
    #[serde(with = "serde_secs")]
    pub elapsed: Duration,
}

/// Time a single query on a fresh connection; connect is not timed
pub async fn time_query(
    store: &dyn PartitionStore,
    query: &Query,
    kind: QueryKind,
) -> Result<QueryTiming, StoreError> {
    let mut conn = store.connect().await?;

    let start = Instant::now();
    let outcome = match kind {
        QueryKind::Fetch => conn.fetch_all(query).await.map(|rows| rows.len() as u64),
        QueryKind::Commit => conn.execute(query).await,
    };
    let elapsed = start.elapsed();

    conn.close().await?;
    let rows = outcome?;

    info!(
        ?kind,
        rows,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Timed query: {}",
        query
    );
    Ok(QueryTiming {
        kind,
        sql: query.sql(),
        rows,
        elapsed,
    })
}
