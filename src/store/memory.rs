//! In-memory store
//!
//! Tables are lists of string keys. Structured queries are evaluated directly
//! with the same bin extraction the SQL rendering uses, so results match what
//! PostgreSQL would return for the same data. Raw SQL is not supported.
//!
//! Used by tests and `--store memory` dry runs; supports injected latency and
//! per-bin query failures.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{PartitionStore, Row, StoreConnection, StoreError, Value};
use crate::partition::{BinCounts, BinId, Query};

#[derive(Clone, Default)]
struct Inner {
    tables: FxHashMap<String, Vec<String>>,
    query_latency: Duration,
    failing_bins: FxHashSet<BinId>,
    refuse_connections: bool,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    /// Add (or replace) a table of keys
    pub fn with_table<I, K>(mut self, name: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.inner_mut().tables.insert(name.to_string(), keys);
        self
    }

    /// Sleep this long inside every query
    pub fn with_query_latency(mut self, latency: Duration) -> Self {
        self.inner_mut().query_latency = latency;
        self
    }

    /// Partition queries whose own bin is `bin` fail
    pub fn with_failing_bin(mut self, bin: BinId) -> Self {
        self.inner_mut().failing_bins.insert(bin);
        self
    }

    /// Every `connect()` fails
    pub fn refusing_connections(mut self) -> Self {
        self.inner_mut().refuse_connections = true;
        self
    }

    /// Connections opened so far
    pub fn opened_connections(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Connections closed so far
    pub fn closed_connections(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        if self.inner.refuse_connections {
            return Err(StoreError::Connect("connection refused".to_string()));
        }
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryConnection {
    inner: Arc<Inner>,
}

impl MemoryConnection {
    fn table(&self, name: &str) -> Result<&[String], StoreError> {
        self.inner
            .tables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    fn evaluate(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        match query {
            Query::BinCounts(q) => {
                let keys = self.table(q.target.table())?;
                let counts: BinCounts = keys.iter().map(|k| (q.heuristic.bin_of(k), 1)).collect();
                let mut rows: Vec<(BinId, u64)> = counts.bins().zip(counts.counts()).collect();
                rows.sort_unstable();
                Ok(rows
                    .into_iter()
                    .map(|(bin, cnt)| Row(vec![Value::Int(bin as i64), Value::Int(cnt as i64)]))
                    .collect())
            }
            Query::Partition(q) => {
                if self.inner.failing_bins.contains(&q.bin_id) {
                    return Err(StoreError::Query(format!(
                        "injected failure for bin {}",
                        q.bin_id
                    )));
                }
                let keys = self.table(q.target.table())?;
                Ok(keys
                    .iter()
                    .filter_map(|k| {
                        let bin = q.heuristic.bin_of(k);
                        q.covers(bin)
                            .then(|| Row(vec![Value::Int(bin as i64), Value::Text(k.clone())]))
                    })
                    .collect())
            }
            Query::Raw { sql } => Err(StoreError::Unsupported(sql.clone())),
        }
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, StoreError> {
        if !self.inner.query_latency.is_zero() {
            tokio::time::sleep(self.inner.query_latency).await;
        }
        self.evaluate(query)
    }

    async fn execute(&mut self, query: &Query) -> Result<u64, StoreError> {
        let rows = self.fetch_all(query).await?;
        Ok(rows.len() as u64)
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{BinCountQuery, Heuristic, TableTarget, build_partition_query};

    fn store() -> MemoryStore {
        MemoryStore::new().with_table("keys", (0..100).map(|i| format!("A{}", i)))
    }

    #[tokio::test]
    async fn test_bin_counts_uniform_last_digit() {
        let store = store();
        let mut conn = store.connect().await.unwrap();
        let target = TableTarget::new("keys", "k").unwrap();

        let rows = conn
            .fetch_all(&BinCountQuery::new(target, Heuristic(0)).into())
            .await
            .unwrap();

        assert_eq!(rows.len(), 10);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.int(0).unwrap(), i as i64);
            assert_eq!(row.int(1).unwrap(), 10);
        }
    }

    #[tokio::test]
    async fn test_partition_query_rows() {
        let store = store();
        let mut conn = store.connect().await.unwrap();
        let target = TableTarget::new("keys", "k").unwrap();

        let q = build_partition_query(&target, Heuristic(0), 7, &[]);
        let rows = conn.fetch_all(&q.into()).await.unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.int(0).unwrap() == 7));

        let q = build_partition_query(&target, Heuristic(0), 7, &[1, 2]);
        assert_eq!(conn.execute(&q.into()).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_unknown_table_and_raw_sql() {
        let store = store();
        let mut conn = store.connect().await.unwrap();
        let target = TableTarget::new("missing", "k").unwrap();

        let err = conn
            .fetch_all(&BinCountQuery::new(target, Heuristic(0)).into())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(t) if t == "missing"));

        let err = conn.fetch_all(&Query::raw("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_failure_injection_and_connection_counters() {
        let store = store().with_failing_bin(3);
        let mut conn = store.connect().await.unwrap();
        let target = TableTarget::new("keys", "k").unwrap();

        let q = build_partition_query(&target, Heuristic(0), 3, &[]);
        assert!(conn.fetch_all(&q.into()).await.is_err());
        conn.close().await.unwrap();

        assert_eq!(store.opened_connections(), 1);
        assert_eq!(store.closed_connections(), 1);

        let refusing = MemoryStore::new().refusing_connections();
        assert!(matches!(
            refusing.connect().await.err(),
            Some(StoreError::Connect(_))
        ));
    }
}
