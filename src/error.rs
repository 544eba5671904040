// Error types for engine construction and game record handling
//
// Game-rule outcomes (illegal speed change, leaving the board, collisions) are
// state transitions and never surface here.

use thiserror::Error;

/// Raised eagerly when a heuristic or policy is assembled from bad parameters
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("number of weights ({weights}) does not match number of heuristics ({heuristics})")]
    WeightCountMismatch { weights: usize, heuristics: usize },
    #[error("no heuristics provided")]
    NoHeuristics,
    #[error("weights must be non-negative and sum to a positive value")]
    InvalidWeights,
    #[error("no policies provided")]
    NoPolicies,
    #[error("number of policies ({policies}) must exceed number of conditions ({conditions}) by one")]
    ConditionCountMismatch { policies: usize, conditions: usize },
    #[error("number of conditions ({conditions}) does not match number of thresholds ({thresholds})")]
    ThresholdCountMismatch { conditions: usize, thresholds: usize },
    #[error("no conditions provided")]
    NoConditions,
    #[error("number of comparisons ({comparisons}) must be 1 or match number of conditions ({conditions})")]
    ComparisonCountMismatch { conditions: usize, comparisons: usize },
    #[error("number of action probabilities ({0}) does not match number of actions (5)")]
    ActionProbabilityMismatch(usize),
    #[error("no actions provided")]
    NoActions,
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },
}

/// Raised while loading or verifying a recorded game
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read game record: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse game record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("game record is empty")]
    Empty,
    #[error("game record is incomplete: last snapshot is still running")]
    Unfinished,
    #[error("snapshot {index} is inconsistent: {reason}")]
    InvalidSnapshot { index: usize, reason: String },
    #[error("player {player} not present in snapshot {index}")]
    UnknownPlayer { index: usize, player: u8 },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transition {index} -> {next} does not reproduce the record: {reason}")]
    Mismatch {
        index: usize,
        next: usize,
        reason: String,
    },
}
