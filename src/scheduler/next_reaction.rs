use super::*;
use crate::indexed_heap::IndexedMinHeap;

const NAME: &str = "next-reaction";

/// Gibson and Bruck's next reaction method.
///
/// Every reaction holds an absolute putative firing time in an
/// [`IndexedMinHeap`]. Only the fired reaction draws a new random number;
/// the other changed reactions have their remaining waiting time rescaled by
/// `a_old / a_new`. A reaction with zero propensity sits at `+inf` and draws
/// afresh once its propensity becomes positive again.
#[derive(Debug, Clone)]
pub struct NextReactionScheduler {
    heap: IndexedMinHeap,
    last_propensity: Vec<f64>,
    time: f64,
    state: SchedulerState,
}

impl NextReactionScheduler {
    pub fn new() -> Self {
        NextReactionScheduler {
            heap: IndexedMinHeap::new(),
            last_propensity: Vec::new(),
            time: 0.,
            state: SchedulerState::Idle,
        }
    }

    /// Putative absolute firing time of `reaction`.
    pub fn putative_time(&self, reaction: ReactionId) -> Option<f64> {
        self.heap.key(reaction.index())
    }

    fn remember(&mut self, reaction: ReactionId, propensity: f64) {
        if reaction.index() >= self.last_propensity.len() {
            self.last_propensity.resize(reaction.index() + 1, 0.);
        }
        self.last_propensity[reaction.index()] = propensity;
    }

    fn fresh_draw(&mut self, reaction: ReactionId, propensity: f64, rng: &mut dyn RngCore) {
        let tau = self.time + exponential_waiting_time(rng, propensity);
        self.heap.push(reaction.index(), tau);
        self.remember(reaction, propensity);
    }

    fn rescale(&mut self, reaction: ReactionId, propensity: f64, rng: &mut dyn RngCore) {
        let (Some(old_tau), Some(&old_propensity)) = (
            self.heap.key(reaction.index()),
            self.last_propensity.get(reaction.index()),
        ) else {
            self.fresh_draw(reaction, propensity, rng);
            return;
        };
        if propensity <= 0. {
            self.heap.update(reaction.index(), f64::INFINITY);
            self.remember(reaction, 0.);
        } else if old_propensity <= 0. || old_tau.is_infinite() {
            self.fresh_draw(reaction, propensity, rng);
        } else if old_propensity != propensity {
            let tau = self.time + (old_propensity / propensity) * (old_tau - self.time);
            self.heap.update(reaction.index(), tau);
            self.remember(reaction, propensity);
        }
    }

    fn sync(&mut self, network: &mut ReactionNetwork, rng: &mut dyn RngCore, fired: Option<ReactionId>) {
        for change in network.take_changes() {
            match change {
                NetworkChange::ReactionAdded(id) => {
                    if let Ok(propensity) = network.propensity(id) {
                        self.fresh_draw(id, propensity, rng);
                    }
                }
                NetworkChange::ReactionRemoved(id) => {
                    self.heap.remove(id.index());
                }
                NetworkChange::PropensityChanged(id) => {
                    if Some(id) == fired {
                        continue;
                    }
                    if let Ok(propensity) = network.propensity(id) {
                        self.rescale(id, propensity, rng);
                    }
                }
            }
        }
        if let Some(id) = fired {
            if let Ok(propensity) = network.propensity(id) {
                self.fresh_draw(id, propensity, rng);
            }
        }
    }
}

impl Default for NextReactionScheduler {
    fn default() -> Self {
        NextReactionScheduler::new()
    }
}

impl Scheduler for NextReactionScheduler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&mut self, network: &mut ReactionNetwork, rng: &mut dyn RngCore) -> Result<()> {
        network.recompute_all_propensities();
        network.take_changes();
        self.heap.clear();
        self.last_propensity.clear();
        let reactions: Vec<ReactionId> = network.reaction_ids().collect();
        for id in reactions.iter().copied() {
            self.fresh_draw(id, network.propensity(id)?, rng);
        }
        self.state = SchedulerState::Armed;
        debug!(scheduler = NAME, reactions = reactions.len(), time = self.time, "initialized");
        Ok(())
    }

    fn step(
        &mut self,
        network: &mut ReactionNetwork,
        rng: &mut dyn RngCore,
        time_limit: Option<f64>,
    ) -> Result<StepOutcome> {
        check_steppable(self.state)?;
        self.sync(network, rng, None);

        let Some((item, tau)) = self.heap.peek().filter(|(_, tau)| tau.is_finite()) else {
            return Ok(exhaust(&mut self.time, &mut self.state, time_limit, NAME));
        };
        if let Some(limit) = time_limit {
            if tau > limit {
                self.time = self.time.max(limit);
                self.state = SchedulerState::Armed;
                return Ok(StepOutcome::LimitReached);
            }
        }

        let reaction = ReactionId(item as u32);
        self.time = tau;
        self.state = SchedulerState::Fired;
        network.fire(reaction)?;
        self.sync(network, rng, Some(reaction));
        self.state = SchedulerState::Armed;
        Ok(StepOutcome::Fired {
            reaction,
            time: self.time,
        })
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn state(&self) -> SchedulerState {
        self.state
    }

    fn reset(&mut self) {
        self.heap.clear();
        self.last_propensity.clear();
        self.time = 0.;
        self.state = SchedulerState::Idle;
    }

    fn verify(&self, network: &ReactionNetwork) -> std::result::Result<(), InvariantViolation> {
        self.heap.check_invariants()?;
        let mut live = 0;
        for id in network.reaction_ids() {
            live += 1;
            let Some(tau) = self.heap.key(id.index()) else {
                return Err(InvariantViolation::UntrackedReaction { reaction: id });
            };
            let zero = network.propensity(id).map_or(true, |a| a <= 0.);
            if zero != tau.is_infinite() {
                return Err(InvariantViolation::UntrackedReaction { reaction: id });
            }
        }
        if live != self.heap.len() {
            return Err(InvariantViolation::HeapCorrupted {
                slot: self.heap.len(),
            });
        }
        Ok(())
    }
}
