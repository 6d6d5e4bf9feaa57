use crate::ending_criterion::EndingCriterion;
use crate::error::Result;
use crate::network::ReactionNetwork;
use crate::reaction::ReactionId;
use crate::scheduler::{Scheduler, SchedulerKind, SchedulerState, StepOutcome};
use crate::signals::{ChemEvent, Connection, SignalHub, Target};
use crate::species::SpeciesId;
use rand::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunLimit {
    Steps(usize),
    /// Absolute simulation time.
    Time(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The step budget was used up with reactions still able to fire.
    Continued,
    Exhausted,
    /// A time limit or an ending criterion stopped the run.
    LimitReached,
}

/// A reaction network together with the scheduler that drives it, the
/// random number generator, and the observers of its events.
pub struct Simulation {
    network: ReactionNetwork,
    scheduler: Box<dyn Scheduler>,
    rng: StdRng,
    signals: SignalHub,
    dispatch: bool,
    steps: usize,
    trajectory: Option<Vec<(f64, ReactionId)>>,
}

/*
 * Constructors
 */
impl Simulation {
    pub fn new(network: ReactionNetwork, kind: SchedulerKind, seed: u64) -> Self {
        Simulation::with_scheduler(network, kind.build(), seed)
    }

    pub fn with_scheduler(network: ReactionNetwork, scheduler: Box<dyn Scheduler>, seed: u64) -> Self {
        Simulation {
            network,
            scheduler,
            rng: StdRng::seed_from_u64(seed),
            signals: SignalHub::new(),
            dispatch: true,
            steps: 0,
            trajectory: None,
        }
    }

    /// Keeps `(time, reaction)` for every firing from now on.
    pub fn record_trajectory(&mut self, record: bool) {
        self.trajectory = if record { Some(Vec::new()) } else { None };
    }

    /// With dispatch off, events are left queued for
    /// [`Simulation::drain_events`] instead of going to the [`SignalHub`].
    pub fn set_dispatch(&mut self, dispatch: bool) {
        self.dispatch = dispatch;
    }

    pub fn into_network(self) -> ReactionNetwork {
        self.network
    }
}

/*
 * Access to data
 */
impl Simulation {
    pub fn network(&self) -> &ReactionNetwork {
        &self.network
    }

    /// Mutations made here are picked up by the scheduler on the next step.
    pub fn network_mut(&mut self) -> &mut ReactionNetwork {
        &mut self.network
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn signals_mut(&mut self) -> &mut SignalHub {
        &mut self.signals
    }

    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn trajectory(&self) -> Option<&[(f64, ReactionId)]> {
        self.trajectory.as_deref()
    }

    pub fn drain_events(&mut self) -> Vec<ChemEvent> {
        self.network.drain_events()
    }
}

/*
 * Observation
 */
impl Simulation {
    /// Turns on signaling for `species` and connects `callback` to it.
    /// Events queued before the call are not delivered to `callback`.
    pub fn connect_copy_number(
        &mut self,
        species: SpeciesId,
        callback: impl FnMut(f64, &ChemEvent) + 'static,
    ) -> Result<Connection> {
        self.network.start_signaling_species(species)?;
        self.settle_connections();
        let generation = self.network.generation(Target::Species(species));
        Ok(self.signals.connect_copy_number(species, generation, callback))
    }

    /// Turns on signaling for `reaction` and connects `callback` to it.
    /// Events queued before the call are not delivered to `callback`.
    pub fn connect_firing(
        &mut self,
        reaction: ReactionId,
        callback: impl FnMut(f64, &ChemEvent) + 'static,
    ) -> Result<Connection> {
        self.network.start_signaling_reaction(reaction)?;
        self.settle_connections();
        let generation = self.network.generation(Target::Reaction(reaction));
        Ok(self.signals.connect_firing(reaction, generation, callback))
    }

    /// Delivers what is already queued, then forgets connections to entities
    /// that were removed in the meantime.
    fn settle_connections(&mut self) {
        self.dispatch_events();
        let network = &self.network;
        self.signals
            .prune(|target, generation| network.is_current(target, generation));
    }

    pub fn disconnect(&mut self, connection: Connection) -> bool {
        self.signals.disconnect(connection)
    }

    fn dispatch_events(&mut self) {
        if !self.dispatch || self.network.pending_events() == 0 {
            return;
        }
        let events = self.network.drain_tagged_events();
        self.signals.dispatch(self.scheduler.time(), &events);
    }
}

/*
 * Evolution
 */
impl Simulation {
    pub fn initialize(&mut self) -> Result<()> {
        self.scheduler.initialize(&mut self.network, &mut self.rng)?;
        debug!(
            scheduler = self.scheduler.name(),
            species = self.network.number_of_species(),
            reactions = self.network.number_of_reactions(),
            "simulation initialized"
        );
        Ok(())
    }

    /// Time back to zero and the scheduler back to `Idle`. Copy numbers are
    /// left as they are; call [`Simulation::initialize`] before stepping.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.steps = 0;
        if let Some(trajectory) = self.trajectory.as_mut() {
            trajectory.clear();
        }
        debug!(scheduler = self.scheduler.name(), "simulation reset");
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn step(&mut self) -> Result<StepOutcome> {
        self.step_with_limit(None)
    }

    fn step_with_limit(&mut self, time_limit: Option<f64>) -> Result<StepOutcome> {
        // Changes made between steps happened at the current time.
        self.dispatch_events();
        let outcome = self
            .scheduler
            .step(&mut self.network, &mut self.rng, time_limit)?;
        if let StepOutcome::Fired { reaction, time } = outcome {
            self.steps += 1;
            if let Some(trajectory) = self.trajectory.as_mut() {
                trajectory.push((time, reaction));
            }
        }
        self.dispatch_events();
        Ok(outcome)
    }

    pub fn run(&mut self, limit: RunLimit) -> Result<RunStatus> {
        match limit {
            RunLimit::Steps(n) => {
                for _ in 0..n {
                    match self.step_with_limit(None)? {
                        StepOutcome::Fired { .. } => {}
                        StepOutcome::Exhausted => return Ok(RunStatus::Exhausted),
                        StepOutcome::LimitReached => return Ok(RunStatus::LimitReached),
                    }
                }
                Ok(RunStatus::Continued)
            }
            RunLimit::Time(end_time) => loop {
                match self.step_with_limit(Some(end_time))? {
                    StepOutcome::Fired { .. } => {}
                    StepOutcome::Exhausted => return Ok(RunStatus::Exhausted),
                    StepOutcome::LimitReached => return Ok(RunStatus::LimitReached),
                }
            },
        }
    }

    /// Steps until one of `criteria` asks to stop or the network is
    /// exhausted. Criteria are consulted between steps only.
    pub fn run_until(&mut self, criteria: &mut [Box<dyn EndingCriterion>]) -> Result<RunStatus> {
        if self.scheduler.state() == SchedulerState::Idle {
            self.initialize()?;
        }
        let time = self.time();
        for criterion in criteria.iter_mut() {
            criterion.initialize(&self.network, time)?;
        }
        let time_limit = criteria
            .iter()
            .filter_map(|criterion| criterion.time_limit())
            .reduce(f64::min);

        loop {
            if criteria.iter().any(|criterion| criterion.should_end()) {
                return Ok(RunStatus::LimitReached);
            }
            let outcome = self.step_with_limit(time_limit)?;
            let fired = match outcome {
                StepOutcome::Fired { reaction, .. } => Some(reaction),
                _ => None,
            };
            let time = self.time();
            for criterion in criteria.iter_mut() {
                criterion.update(&self.network, time, fired);
            }
            if outcome == StepOutcome::Exhausted {
                return Ok(RunStatus::Exhausted);
            }
        }
    }
}

/// Runs `network` from a fresh scheduler until one of `ending_criteria`
/// ends it, returning the final network and the firing trajectory.
pub fn simulate(
    network: ReactionNetwork,
    kind: SchedulerKind,
    ending_criteria: &mut [Box<dyn EndingCriterion>],
    seed: u64,
) -> Result<(ReactionNetwork, Vec<(f64, ReactionId)>)> {
    let mut simulation = Simulation::new(network, kind, seed);
    simulation.record_trajectory(true);
    simulation.initialize()?;
    simulation.run_until(ending_criteria)?;
    let trajectory = simulation.trajectory.take().unwrap_or_default();
    Ok((simulation.network, trajectory))
}
