use thiserror::Error;

use crate::store::StoreError;

/// Reason carried by every [`SelectionFailure`]
pub const NO_BALANCED_HEURISTIC: &str = "no heuristic meets minimum bin proportion";

/// No candidate heuristic produced a fair partition. Fatal to the run.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason} (min fraction {min_fraction}, {candidates_tried} candidates tried)")]
pub struct SelectionFailure {
    pub reason: String,
    pub min_fraction: f64,
    pub candidates_tried: usize,
}

impl SelectionFailure {
    pub fn exhausted(min_fraction: f64, candidates_tried: usize) -> Self {
        Self {
            reason: NO_BALANCED_HEURISTIC.to_string(),
            min_fraction,
            candidates_tried,
        }
    }
}

/// Invalid parameters, rejected before any store interaction
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),

    #[error("Invalid {kind} identifier: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("min_bin_fraction must be within [0, 1], got {0}")]
    FractionOutOfRange(f64),

    #[error("percent_overlap must be within [0, 1], got {0}")]
    OverlapOutOfRange(f64),

    #[error("At least one candidate heuristic is required")]
    NoCandidates,

    #[error("Candidate heuristic {0} is outside 0..=9")]
    CandidateOutOfRange(u8),

    #[error("Candidate heuristic {0} appears more than once")]
    DuplicateCandidate(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Errors that abort a harness run before any worker is spawned
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Selection failure: {0}")]
    Selection(#[from] SelectionFailure),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
