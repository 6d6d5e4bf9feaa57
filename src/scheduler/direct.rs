use super::*;

const NAME: &str = "direct";

/// Gillespie's direct method. Every step sums all propensities and picks a
/// reaction with probability proportional to its propensity by a linear scan.
#[derive(Debug, Clone)]
pub struct DirectScheduler {
    nodes: Vec<ReactionId>,
    time: f64,
    state: SchedulerState,
}

impl DirectScheduler {
    pub fn new() -> Self {
        DirectScheduler {
            nodes: Vec::new(),
            time: 0.,
            state: SchedulerState::Idle,
        }
    }

    /// Reactions in the order they will be scanned.
    pub fn nodes(&self) -> &[ReactionId] {
        &self.nodes
    }

    fn sync(&mut self, network: &mut ReactionNetwork) {
        for change in network.take_changes() {
            match change {
                NetworkChange::ReactionAdded(id) => {
                    if network.contains_reaction(id) && !self.nodes.contains(&id) {
                        self.nodes.push(id);
                    }
                }
                NetworkChange::ReactionRemoved(id) => self.nodes.retain(|&node| node != id),
                NetworkChange::PropensityChanged(_) => {}
            }
        }
    }

    /// First reaction whose cumulative propensity exceeds `draw`. Rounding
    /// can leave `draw` at the very end of the range, in which case the last
    /// reaction with a positive propensity is chosen.
    fn select(&self, propensities: &[f64], draw: f64) -> Option<ReactionId> {
        let mut cumulative = 0.;
        let mut last_positive = None;
        for (&id, &propensity) in self.nodes.iter().zip(propensities.iter()) {
            if propensity <= 0. {
                continue;
            }
            cumulative += propensity;
            if cumulative > draw {
                return Some(id);
            }
            last_positive = Some(id);
        }
        last_positive
    }
}

impl Default for DirectScheduler {
    fn default() -> Self {
        DirectScheduler::new()
    }
}

impl Scheduler for DirectScheduler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&mut self, network: &mut ReactionNetwork, _rng: &mut dyn RngCore) -> Result<()> {
        network.recompute_all_propensities();
        network.take_changes();
        self.nodes = network.reaction_ids().collect();
        self.state = SchedulerState::Armed;
        debug!(scheduler = NAME, reactions = self.nodes.len(), time = self.time, "initialized");
        Ok(())
    }

    fn step(
        &mut self,
        network: &mut ReactionNetwork,
        rng: &mut dyn RngCore,
        time_limit: Option<f64>,
    ) -> Result<StepOutcome> {
        check_steppable(self.state)?;
        self.sync(network);

        let propensities: Vec<f64> = self
            .nodes
            .iter()
            .map(|&id| network.propensity(id).unwrap_or(0.))
            .collect();
        let total: f64 = propensities.iter().sum();
        if total <= 0. {
            return Ok(exhaust(&mut self.time, &mut self.state, time_limit, NAME));
        }

        let dt = exponential_waiting_time(rng, total);
        if let Some(limit) = time_limit {
            if self.time + dt > limit {
                self.time = self.time.max(limit);
                self.state = SchedulerState::Armed;
                return Ok(StepOutcome::LimitReached);
            }
        }
        let draw = rng.random::<f64>() * total;
        let Some(reaction) = self.select(&propensities, draw) else {
            return Ok(exhaust(&mut self.time, &mut self.state, time_limit, NAME));
        };

        self.time += dt;
        self.state = SchedulerState::Fired;
        network.fire(reaction)?;
        self.sync(network);
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
        self.nodes.clear();
        self.time = 0.;
        self.state = SchedulerState::Idle;
    }

    fn verify(&self, network: &ReactionNetwork) -> std::result::Result<(), InvariantViolation> {
        let mut tracked = self.nodes.clone();
        tracked.sort();
        let live: Vec<ReactionId> = network.reaction_ids().collect();
        if let Some(&reaction) = live
            .iter()
            .find(|id| tracked.binary_search(id).is_err())
            .or_else(|| tracked.iter().find(|id| live.binary_search(id).is_err()))
        {
            return Err(InvariantViolation::UntrackedReaction { reaction });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::species::NO_UPPER_LIMIT;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn selection_follows_cumulative_propensity() {
        let mut scheduler = DirectScheduler::new();
        scheduler.nodes = vec![ReactionId(0), ReactionId(1), ReactionId(2)];
        let propensities = [1., 0., 3.];
        assert_eq!(scheduler.select(&propensities, 0.), Some(ReactionId(0)));
        assert_eq!(scheduler.select(&propensities, 0.999), Some(ReactionId(0)));
        assert_eq!(scheduler.select(&propensities, 1.), Some(ReactionId(2)));
        assert_eq!(scheduler.select(&propensities, 4.), Some(ReactionId(2)));
        assert_eq!(scheduler.select(&[0., 0., 0.], 0.), None);
    }

    #[test]
    fn picks_up_reactions_added_between_steps() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 0, NO_UPPER_LIMIT).unwrap();
        let mut scheduler = DirectScheduler::new();
        let mut rng = StdRng::seed_from_u64(11);
        scheduler.initialize(&mut network, &mut rng).unwrap();
        assert_eq!(
            scheduler.step(&mut network, &mut rng, None).unwrap(),
            StepOutcome::Exhausted
        );

        let source = network.add_reaction(root, &[], &[a], 1.0).unwrap();
        let outcome = scheduler.step(&mut network, &mut rng, None).unwrap();
        assert!(matches!(outcome, StepOutcome::Fired { reaction, .. } if reaction == source));
        assert_eq!(scheduler.nodes(), &[source]);

        network.remove_reaction(source).unwrap();
        assert_eq!(
            scheduler.step(&mut network, &mut rng, None).unwrap(),
            StepOutcome::Exhausted
        );
        assert!(scheduler.nodes().is_empty());
        scheduler.verify(&network).unwrap();
    }
}
