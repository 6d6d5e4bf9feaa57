use crate::{ReactionId, SpeciesId};
use thiserror::Error;

/// Broken invariants of the reaction network. These always indicate a
/// malformed network or a bug and abort the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("copy number of {species} would underflow: {copy_number} - {by}")]
    Underflow {
        species: SpeciesId,
        copy_number: u64,
        by: u64,
    },

    #[error("copy number of {species} would exceed its upper limit {upper_limit}: {requested}")]
    OverflowBound {
        species: SpeciesId,
        requested: u64,
        upper_limit: u64,
    },

    #[error("dependency edge {from} -> {to} does not match species membership")]
    MalformedDependency { from: ReactionId, to: ReactionId },

    #[error("cached propensity of {reaction} is {cached}, recomputed {recomputed}")]
    PropensityMismatch {
        reaction: ReactionId,
        cached: f64,
        recomputed: f64,
    },

    #[error("indexed heap is corrupted at slot {slot}")]
    HeapCorrupted { slot: usize },

    #[error("scheduler and network disagree about {reaction}")]
    UntrackedReaction { reaction: ReactionId },
}

#[derive(Debug, Error)]
pub enum ChemError {
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("unknown species: {0}")]
    UnknownSpecies(String),

    #[error("unknown reaction: {0}")]
    UnknownReaction(ReactionId),

    #[error("unknown scope: {0}")]
    UnknownScope(usize),

    #[error("unsupported arity {reactants} -> {products} for a {kind} reaction")]
    InvalidArity {
        reactants: usize,
        products: usize,
        kind: &'static str,
    },

    #[error("rate must be finite and non-negative, got {0}")]
    InvalidRate(f64),

    #[error("species {species} is still referenced by {reactions} reaction(s)")]
    SpeciesInUse { species: SpeciesId, reactions: usize },

    #[error("reaction {0} is passivated")]
    ReactionPassivated(ReactionId),

    #[error("scheduler cannot step from state {0:?}")]
    SchedulerNotArmed(crate::scheduler::SchedulerState),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChemError {
    /// Fatal errors mean the network can no longer be trusted and the run
    /// must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChemError::Invariant(_) | ChemError::SchedulerNotArmed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChemError>;
