//! Benchmark Run Phases
//!
//! ```text
//! Idle -> HeuristicSelection -> PlanBuilt -> WorkersRunning -> Aggregated -> Done
//!                  |
//!                  +-> SelectionFailed
//! ```
//!
//! A failing worker does not change the run phase; it is a per-worker
//! terminal status ([`super::WorkerStatus::Failed`]).

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Idle,
    HeuristicSelection,
    PlanBuilt,
    WorkersRunning,
    Aggregated,

    /// Terminal: report produced
    Done,

    /// Terminal: no heuristic qualified, no workers were spawned
    SelectionFailed,
}

impl RunPhase {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::SelectionFailed)
    }

    /// Legal single-step transitions. A terminal phase may restart at
    /// `HeuristicSelection` when the harness is reused for another run.
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, HeuristicSelection)
                | (HeuristicSelection, PlanBuilt)
                | (HeuristicSelection, SelectionFailed)
                | (PlanBuilt, WorkersRunning)
                | (WorkersRunning, Aggregated)
                | (Aggregated, Done)
                | (Done, HeuristicSelection)
                | (SelectionFailed, HeuristicSelection)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "IDLE",
            RunPhase::HeuristicSelection => "HEURISTIC_SELECTION",
            RunPhase::PlanBuilt => "PLAN_BUILT",
            RunPhase::WorkersRunning => "WORKERS_RUNNING",
            RunPhase::Aggregated => "AGGREGATED",
            RunPhase::Done => "DONE",
            RunPhase::SelectionFailed => "SELECTION_FAILED",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current phase plus the transitions taken so far
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: RunPhase,
    history: Vec<RunPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: RunPhase::Idle,
            history: vec![RunPhase::Idle],
        }
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    /// Move to `next`. Illegal transitions are ignored and logged.
    pub fn advance(&mut self, next: RunPhase) -> bool {
        if !self.current.can_transition_to(next) {
            tracing::error!("Illegal run phase transition {} -> {}", self.current, next);
            return false;
        }
        tracing::debug!("Run phase {} -> {}", self.current, next);
        if self.current.is_terminal() {
            self.history.clear();
        }
        self.current = next;
        self.history.push(next);
        true
    }
}
