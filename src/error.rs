//! Belief Market error types.
//!
//! # Error Classification
//!
//! Almost every error here is a normal game outcome: the caller asked for
//! something the rules do not allow (unknown target, empty wallet, wrong
//! phase). These are surfaced synchronously and never retried by the engine.
//!
//! The single exception is [`MarketError::InternalInconsistency`], raised
//! when a state invariant is found broken (conviction without affiliation,
//! a poisoned lock, an NPC from a future cohort). It is a defect, never a
//! game outcome, and is never repaired in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::npc::NpcId;
use crate::round::Phase;

/// Belief Market errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Target NPC does not exist or has not been spawned yet.
    #[error("Unknown target: NPC {0}")]
    UnknownTarget(NpcId),

    /// Belief id not known to the belief registry.
    #[error("Unknown belief: {0}")]
    UnknownBelief(String),

    /// Agent id not known to the token accounts.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Agent tried to persuade with a belief founded by someone else.
    #[error("Belief {belief} is not founded by agent {agent}")]
    BeliefNotOwned {
        /// Requesting agent.
        agent: String,
        /// Belief the agent tried to use.
        belief: String,
    },

    /// Balance strictly below the attempt cost.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Cost of the attempt.
        required: u64,
        /// Balance at the time of the attempt.
        available: u64,
    },

    /// The game has not been started.
    #[error("Game not started")]
    GameNotStarted,

    /// The game reached its terminal phase.
    #[error("Game ended")]
    GameEnded,

    /// A round transition was requested from the wrong phase.
    #[error("Invalid transition: {command} in phase {phase}")]
    InvalidTransition {
        /// Command that was attempted (`start` / `advance`).
        command: &'static str,
        /// Phase observed when the command ran.
        phase: Phase,
    },

    /// A state invariant was violated.
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Belief Market operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Machine-readable rejection codes returned to calling agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionCode {
    /// NPC not yet spawned or nonexistent
    UnknownTarget,
    /// Belief not in the registry
    UnknownBelief,
    /// Agent not registered
    UnknownAgent,
    /// Belief founded by another agent
    BeliefNotOwned,
    /// Balance below cost
    InsufficientFunds,
    /// Game not started
    GameNotStarted,
    /// Game over
    GameEnded,
    /// Start/advance out of order
    InvalidTransition,
    /// Invariant violation
    InternalInconsistency,
    /// Anything else (config, I/O)
    Internal,
}

impl MarketError {
    /// Map this error to its wire-level rejection code.
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            MarketError::UnknownTarget(_) => RejectionCode::UnknownTarget,
            MarketError::UnknownBelief(_) => RejectionCode::UnknownBelief,
            MarketError::UnknownAgent(_) => RejectionCode::UnknownAgent,
            MarketError::BeliefNotOwned { .. } => RejectionCode::BeliefNotOwned,
            MarketError::InsufficientFunds { .. } => RejectionCode::InsufficientFunds,
            MarketError::GameNotStarted => RejectionCode::GameNotStarted,
            MarketError::GameEnded => RejectionCode::GameEnded,
            MarketError::InvalidTransition { .. } => RejectionCode::InvalidTransition,
            MarketError::InternalInconsistency(_) => RejectionCode::InternalInconsistency,
            MarketError::Config(_) | MarketError::Json(_) | MarketError::Io(_) => {
                RejectionCode::Internal
            },
        }
    }

    /// True for defects that need an operator, not a retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MarketError::InternalInconsistency(_))
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        MarketError::InternalInconsistency(format!("{what} lock poisoned"))
    }
}

impl From<toml::de::Error> for MarketError {
    fn from(err: toml::de::Error) -> Self {
        MarketError::Config(err.to_string())
    }
}
