//! Benchmark Harness
//!
//! Caller-facing entry point tying selection, planning and execution
//! together:
//!
//! ```text
//! select_heuristic ──▶ PartitionPlan ──▶ BenchmarkCoordinator ──▶ BenchmarkReport
//!   (bin counts)        (1 query/bin)      (N workers, N conns)
//! ```
//!
//! Configuration and selection errors are returned before any worker is
//! spawned. Worker failures never surface as errors; they are in the report.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::bench::stress::{self, ConnectionStressReport, QueryKind, QueryTiming};
use crate::bench::{BenchmarkCoordinator, BenchmarkReport, PhaseTracker, RunPhase};
use crate::config::{BenchmarkConfig, validate_candidates};
use crate::error::{ConfigurationError, HarnessError};
use crate::partition::{
    DEFAULT_MIN_BIN_FRACTION, Heuristic, PartitionPlan, Query, TableTarget, select_heuristic,
};
use crate::store::{PartitionStore, StoreError};

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub candidates: Vec<Heuristic>,
    pub min_bin_fraction: f64,
    pub query_timeout: Option<Duration>,
    pub overlap_seed: Option<u64>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            candidates: Heuristic::default_candidates(),
            min_bin_fraction: DEFAULT_MIN_BIN_FRACTION,
            query_timeout: None,
            overlap_seed: None,
        }
    }
}

impl HarnessSettings {
    pub fn from_config(config: &BenchmarkConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            candidates: config.heuristics(),
            min_bin_fraction: config.min_bin_fraction,
            query_timeout: config.query_timeout(),
            overlap_seed: config.overlap_seed,
        })
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let raw: Vec<u8> = self.candidates.iter().map(|h| h.index()).collect();
        validate_candidates(&raw)?;
        if !(0.0..=1.0).contains(&self.min_bin_fraction) {
            return Err(ConfigurationError::FractionOutOfRange(self.min_bin_fraction));
        }
        Ok(())
    }
}

pub struct BenchmarkHarness {
    store: Arc<dyn PartitionStore>,
    settings: HarnessSettings,
    phases: PhaseTracker,
}

impl BenchmarkHarness {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self {
            store,
            settings: HarnessSettings::default(),
            phases: PhaseTracker::new(),
        }
    }

    pub fn with_settings(
        store: Arc<dyn PartitionStore>,
        settings: HarnessSettings,
    ) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        Ok(Self {
            store,
            settings,
            phases: PhaseTracker::new(),
        })
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Phase reached by the most recent run
    pub fn phase(&self) -> RunPhase {
        self.phases.current()
    }

    pub fn phase_history(&self) -> &[RunPhase] {
        self.phases.history()
    }

    /// First candidate heuristic whose bins each hold at least
    /// `min_fraction` of the table
    pub async fn select_heuristic(
        &self,
        table: &str,
        key_field: &str,
        min_fraction: f64,
    ) -> Result<Heuristic, HarnessError> {
        if !(0.0..=1.0).contains(&min_fraction) {
            return Err(ConfigurationError::FractionOutOfRange(min_fraction).into());
        }
        let target = TableTarget::new(table, key_field)?;
        self.select(&target, min_fraction).await
    }

    /// Disjoint partition benchmark. `serialized` runs one worker at a time.
    pub async fn run_partitioned(
        &mut self,
        table: &str,
        key_field: &str,
        serialized: bool,
    ) -> Result<BenchmarkReport, HarnessError> {
        let target = TableTarget::new(table, key_field)?;
        let heuristic = self.selection_phase(&target).await?;

        let plan = PartitionPlan::disjoint(target, heuristic, &self.settings.candidates);
        self.phases.advance(RunPhase::PlanBuilt);

        self.phases.advance(RunPhase::WorkersRunning);
        let report = self.coordinator().run_partitioned(plan, serialized).await;
        self.finish(report)
    }

    /// Overlapping partition benchmark, sampled with the configured seed
    /// (or entropy when none is set)
    pub async fn run_overlapping(
        &mut self,
        table: &str,
        key_field: &str,
        percent_overlap: f64,
    ) -> Result<BenchmarkReport, HarnessError> {
        let mut rng = match self.settings.overlap_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_overlapping_with_rng(table, key_field, percent_overlap, &mut rng)
            .await
    }

    /// Overlapping partition benchmark with caller-supplied randomness
    pub async fn run_overlapping_with_rng<R: Rng + Send>(
        &mut self,
        table: &str,
        key_field: &str,
        percent_overlap: f64,
        rng: &mut R,
    ) -> Result<BenchmarkReport, HarnessError> {
        if !(0.0..=1.0).contains(&percent_overlap) {
            return Err(ConfigurationError::OverlapOutOfRange(percent_overlap).into());
        }
        let target = TableTarget::new(table, key_field)?;
        let heuristic = self.selection_phase(&target).await?;

        let plan = PartitionPlan::overlapping(
            target,
            heuristic,
            &self.settings.candidates,
            percent_overlap,
            rng,
        )?;
        self.phases.advance(RunPhase::PlanBuilt);

        self.phases.advance(RunPhase::WorkersRunning);
        let report = self
            .coordinator()
            .run_overlapping(plan, percent_overlap)
            .await;
        self.finish(report)
    }

    /// Open and close `level` connections, reporting connect cost
    pub async fn connection_stress_test(
        &self,
        level: usize,
    ) -> Result<ConnectionStressReport, StoreError> {
        stress::connection_stress_test(self.store.as_ref(), level).await
    }

    /// Time one query on its own connection
    pub async fn time_query(
        &self,
        query: &Query,
        kind: QueryKind,
    ) -> Result<QueryTiming, StoreError> {
        stress::time_query(self.store.as_ref(), query, kind).await
    }

    fn coordinator(&self) -> BenchmarkCoordinator {
        BenchmarkCoordinator::new(Arc::clone(&self.store))
            .with_query_timeout(self.settings.query_timeout)
    }

    /// Any selection error, including a store error while counting bins,
    /// ends the run in `SelectionFailed` so the next run can restart.
    async fn selection_phase(&mut self, target: &TableTarget) -> Result<Heuristic, HarnessError> {
        self.phases.advance(RunPhase::HeuristicSelection);
        match self.select(target, self.settings.min_bin_fraction).await {
            Ok(heuristic) => Ok(heuristic),
            Err(e) => {
                self.phases.advance(RunPhase::SelectionFailed);
                Err(e)
            }
        }
    }

    /// Selection runs on its own connection, released on every path
    async fn select(
        &self,
        target: &TableTarget,
        min_fraction: f64,
    ) -> Result<Heuristic, HarnessError> {
        let mut conn = self.store.connect().await?;
        let result = select_heuristic(
            conn.as_mut(),
            target,
            &self.settings.candidates,
            min_fraction,
        )
        .await;
        if let Err(e) = conn.close().await {
            warn!("Failed to release selection connection: {}", e);
        }
        result
    }

    fn finish(&mut self, report: BenchmarkReport) -> Result<BenchmarkReport, HarnessError> {
        self.phases.advance(RunPhase::Aggregated);
        self.phases.advance(RunPhase::Done);
        debug!(phases = ?self.phases.history(), "Run complete");
        Ok(report)
    }
}
