use crate::error::{ChemError, InvariantViolation, Result};
use crate::network::{NetworkChange, ReactionNetwork};
use crate::reaction::ReactionId;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Lifecycle of a scheduler.
///
/// `Idle` until [`Scheduler::initialize`]; `Armed` between steps; `Fired`
/// only while a firing is being applied, so a scheduler left in `Fired`
/// means that firing failed; `Exhausted` when no reaction can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Armed,
    Fired,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Fired { reaction: ReactionId, time: f64 },
    /// Total propensity is zero.
    Exhausted,
    /// The next event would happen after the time limit. Time now equals the
    /// limit and nothing fired.
    LimitReached,
}

/// Picks and fires the next reaction of a [`ReactionNetwork`].
///
/// Schedulers learn about the network only through its change log, which
/// they drain at the start and at the end of every step, so mutations made
/// between steps are always seen by the next one.
pub trait Scheduler {
    fn name(&self) -> &'static str;

    /// Recomputes every propensity and rebuilds the scheduling structures.
    /// Time is left unchanged.
    fn initialize(&mut self, network: &mut ReactionNetwork, rng: &mut dyn RngCore) -> Result<()>;

    /// Advances to the next event, firing it unless it lies beyond the
    /// absolute `time_limit`.
    fn step(
        &mut self,
        network: &mut ReactionNetwork,
        rng: &mut dyn RngCore,
        time_limit: Option<f64>,
    ) -> Result<StepOutcome>;

    fn time(&self) -> f64;

    fn state(&self) -> SchedulerState;

    /// Back to `Idle` at time zero.
    fn reset(&mut self);

    /// Checks that the scheduler tracks exactly the live reactions of
    /// `network`.
    fn verify(&self, network: &ReactionNetwork) -> std::result::Result<(), InvariantViolation>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SchedulerKind {
    #[default]
    Direct,
    NextReaction,
}

impl SchedulerKind {
    pub fn build(&self) -> Box<dyn Scheduler> {
        match self {
            SchedulerKind::Direct => Box::new(DirectScheduler::new()),
            SchedulerKind::NextReaction => Box::new(NextReactionScheduler::new()),
        }
    }
}

/// Waiting time of a Poisson process with the given rate. Zero rate never
/// fires.
pub fn exponential_waiting_time(rng: &mut dyn RngCore, rate: f64) -> f64 {
    if rate <= 0. {
        return f64::INFINITY;
    }
    -(1. - rng.random::<f64>()).ln() / rate
}

fn check_steppable(state: SchedulerState) -> Result<()> {
    match state {
        SchedulerState::Armed | SchedulerState::Exhausted => Ok(()),
        SchedulerState::Idle | SchedulerState::Fired => Err(ChemError::SchedulerNotArmed(state)),
    }
}

/// Shared handling of a network with nothing left to fire.
fn exhaust(time: &mut f64, state: &mut SchedulerState, time_limit: Option<f64>, name: &str) -> StepOutcome {
    if *state != SchedulerState::Exhausted {
        info!(scheduler = name, time = *time, "network exhausted");
    }
    *state = SchedulerState::Exhausted;
    if let Some(limit) = time_limit {
        *time = time.max(limit);
    }
    StepOutcome::Exhausted
}

mod direct;
pub use direct::*;

mod next_reaction;
pub use next_reaction::*;
