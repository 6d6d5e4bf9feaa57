use crate::composite::{CompositeTree, NodeId};
use crate::container::Container;
use crate::error::{ChemError, Result};
use crate::reaction::{Reaction, ReactionId};
use crate::signals::{ChemEvent, Target};
use crate::species::{Species, SpeciesId};
use crate::species_registry::SpeciesRegistry;
use ndarray::{Array1, Array2};
use std::collections::VecDeque;
use tracing::trace;

mod copy_numbers;
mod dependencies;
mod scopes;

/// What a scheduler has to learn about the network since it last looked.
/// Entries are consumed in order, so an id that was removed and then reused
/// shows up as `ReactionRemoved` followed by `ReactionAdded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkChange {
    ReactionAdded(ReactionId),
    ReactionRemoved(ReactionId),
    PropensityChanged(ReactionId),
}

/// Species/reaction incidence. `matrix[[i, j]]` is the net change of
/// `species[i]` when `reactions[j]` fires.
#[derive(Debug, Clone)]
pub struct Stoichiometry {
    pub species: Vec<SpeciesId>,
    pub reactions: Vec<ReactionId>,
    pub matrix: Array2<i64>,
}

/// Owns every species and reaction of a simulation, the scope tree they are
/// organised in, and the dependency graph between reactions.
///
/// All mutation goes through this type so that cached propensities are
/// recomputed eagerly and every change is recorded for the scheduler.
pub struct ReactionNetwork {
    registry: SpeciesRegistry,
    species: Vec<Option<Species>>,
    free_species: Vec<u32>,
    reactions: Vec<Option<Reaction>>,
    free_reactions: Vec<u32>,
    scopes: CompositeTree<Container>,
    changes: Vec<NetworkChange>,
    events: VecDeque<(ChemEvent, u32)>,
    species_generations: Vec<u32>,
    reaction_generations: Vec<u32>,
}

/*
 * Constructors
 */
impl ReactionNetwork {
    pub fn new(root_name: &str) -> Self {
        ReactionNetwork {
            registry: SpeciesRegistry::new(),
            species: Vec::new(),
            free_species: Vec::new(),
            reactions: Vec::new(),
            free_reactions: Vec::new(),
            scopes: CompositeTree::new(root_name, Container::new()),
            changes: Vec::new(),
            events: VecDeque::new(),
            species_generations: Vec::new(),
            reaction_generations: Vec::new(),
        }
    }
}

impl Default for ReactionNetwork {
    fn default() -> Self {
        ReactionNetwork::new("root")
    }
}

fn bump_generation(generations: &mut Vec<u32>, index: usize) {
    if index >= generations.len() {
        generations.resize(index + 1, 0);
    }
    generations[index] = generations[index].wrapping_add(1);
}

pub(crate) fn species_state(species: &[Option<Species>], id: SpeciesId) -> (u64, u64) {
    match species.get(id.index()).and_then(|s| s.as_ref()) {
        Some(s) => (s.rspecies().copy_number(), s.rspecies().capacity()),
        None => (0, 0),
    }
}

/*
 * Access to data
 */
impl ReactionNetwork {
    pub fn root(&self) -> NodeId {
        self.scopes.root()
    }

    pub fn scopes(&self) -> &CompositeTree<Container> {
        &self.scopes
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    pub fn species(&self, id: SpeciesId) -> Result<&Species> {
        self.species
            .get(id.index())
            .and_then(|s| s.as_ref())
            .ok_or_else(|| ChemError::UnknownSpecies(id.to_string()))
    }

    pub(crate) fn species_mut(&mut self, id: SpeciesId) -> Result<&mut Species> {
        self.species
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .ok_or_else(|| ChemError::UnknownSpecies(id.to_string()))
    }

    pub fn reaction(&self, id: ReactionId) -> Result<&Reaction> {
        self.reactions
            .get(id.index())
            .and_then(|r| r.as_ref())
            .ok_or(ChemError::UnknownReaction(id))
    }

    pub(crate) fn reaction_mut(&mut self, id: ReactionId) -> Result<&mut Reaction> {
        self.reactions
            .get_mut(id.index())
            .and_then(|r| r.as_mut())
            .ok_or(ChemError::UnknownReaction(id))
    }

    pub fn contains_reaction(&self, id: ReactionId) -> bool {
        self.reaction(id).is_ok()
    }

    pub fn species_name(&self, id: SpeciesId) -> Result<&str> {
        let name = self.species(id)?.name_id();
        self.registry
            .int_to_string(name)
            .ok_or_else(|| ChemError::UnknownSpecies(id.to_string()))
    }

    pub fn copy_number(&self, id: SpeciesId) -> Result<u64> {
        Ok(self.species(id)?.copy_number())
    }

    pub fn upper_limit(&self, id: SpeciesId) -> Result<u64> {
        Ok(self.species(id)?.rspecies().upper_limit())
    }

    pub fn propensity(&self, id: ReactionId) -> Result<f64> {
        Ok(self.reaction(id)?.propensity())
    }

    /// Live species ids in index order.
    pub fn species_ids(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        self.species
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| SpeciesId(i as u32))
    }

    /// Live reaction ids in index order.
    pub fn reaction_ids(&self) -> impl Iterator<Item = ReactionId> + '_ {
        self.reactions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_some())
            .map(|(i, _)| ReactionId(i as u32))
    }

    pub fn number_of_species(&self) -> usize {
        self.species.iter().filter(|s| s.is_some()).count()
    }

    pub fn number_of_reactions(&self) -> usize {
        self.reactions.iter().filter(|r| r.is_some()).count()
    }

    /// Sum of the cached propensities.
    pub fn total_propensity(&self) -> f64 {
        self.reactions
            .iter()
            .flatten()
            .map(|reaction| reaction.propensity())
            .sum()
    }

    pub fn stoichiometry(&self) -> Stoichiometry {
        let species: Vec<SpeciesId> = self.species_ids().collect();
        let reactions: Vec<ReactionId> = self.reaction_ids().collect();
        let mut matrix = Array2::zeros((species.len(), reactions.len()));
        for (j, &reaction) in reactions.iter().enumerate() {
            let Ok(reaction) = self.reaction(reaction) else {
                continue;
            };
            for &(s, delta) in reaction.net_change() {
                if let Ok(i) = species.binary_search(&s) {
                    matrix[[i, j]] = delta;
                }
            }
        }
        Stoichiometry {
            species,
            reactions,
            matrix,
        }
    }

    /// Copy numbers of all live species, in the row order of
    /// [`ReactionNetwork::stoichiometry`].
    pub fn copy_numbers(&self) -> Array1<u64> {
        self.species.iter().flatten().map(|s| s.copy_number()).collect()
    }
}

/*
 * Scheduler interface
 */
impl ReactionNetwork {
    /// Hands over the change log accumulated since the last call.
    pub fn take_changes(&mut self) -> Vec<NetworkChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<ChemEvent> {
        self.events.drain(..).map(|(event, _)| event).collect()
    }

    /// Like [`ReactionNetwork::drain_events`], keeping the generation the
    /// concerned entity had when each event was queued.
    pub fn drain_tagged_events(&mut self) -> Vec<(ChemEvent, u32)> {
        self.events.drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Recomputes every cached propensity from the current copy numbers.
    pub fn recompute_all_propensities(&mut self) {
        let species = &self.species;
        for (i, reaction) in self.reactions.iter_mut().enumerate() {
            if let Some(reaction) = reaction {
                reaction.compute_propensity(|s| species_state(species, s));
                self.changes
                    .push(NetworkChange::PropensityChanged(ReactionId(i as u32)));
            }
        }
    }

    pub(crate) fn refresh_propensity(&mut self, id: ReactionId) -> Option<f64> {
        let species = &self.species;
        let reaction = self.reactions.get_mut(id.index())?.as_mut()?;
        let propensity = reaction.compute_propensity(|s| species_state(species, s));
        self.changes.push(NetworkChange::PropensityChanged(id));
        Some(propensity)
    }

    /// Fires `id` once: consumes its reactants, produces its products and
    /// recomputes the propensity of the reaction and of all its dependents.
    ///
    /// Every copy number change is checked before anything is written, so an
    /// error leaves the network untouched.
    pub fn fire(&mut self, id: ReactionId) -> Result<()> {
        let reaction = self.reaction(id)?;
        if reaction.is_passivated() {
            return Err(ChemError::ReactionPassivated(id));
        }
        let signaling = reaction.is_signaling();

        let mut updates = Vec::with_capacity(reaction.net_change().len());
        for &(species, delta) in reaction.net_change() {
            let copy_number = self.species(species)?.rspecies().checked_delta(species, delta)?;
            updates.push((species, delta, copy_number));
        }
        let dependents: Vec<ReactionId> = reaction.affected_reactions().iter().copied().collect();

        for (species, delta, copy_number) in updates {
            let rspecies = self.species_mut(species)?.rspecies_mut();
            rspecies.set_copy_number(species, copy_number)?;
            if rspecies.is_signaling() {
                self.queue_event(ChemEvent::CopyNumberChanged {
                    species,
                    delta,
                    copy_number,
                });
            }
        }

        self.refresh_propensity(id);
        for dependent in dependents {
            self.refresh_propensity(dependent);
        }
        if signaling {
            self.queue_event(ChemEvent::ReactionFired { reaction: id });
        }
        trace!(reaction = %id, "fired");
        Ok(())
    }

    pub fn set_rate(&mut self, id: ReactionId, rate: f64) -> Result<()> {
        self.reaction_mut(id)?.set_rate(rate)?;
        self.refresh_propensity(id);
        Ok(())
    }

    /// Excludes `id` from scheduling without removing it. Its propensity is
    /// pinned at zero until [`ReactionNetwork::activate_reaction`].
    pub fn passivate_reaction(&mut self, id: ReactionId) -> Result<()> {
        self.reaction_mut(id)?.passivate();
        self.changes.push(NetworkChange::PropensityChanged(id));
        Ok(())
    }

    pub fn activate_reaction(&mut self, id: ReactionId) -> Result<()> {
        self.reaction_mut(id)?.activate();
        self.refresh_propensity(id);
        Ok(())
    }

    pub fn is_passivated(&self, id: ReactionId) -> Result<bool> {
        Ok(self.reaction(id)?.is_passivated())
    }
}

/*
 * Signaling
 */
impl ReactionNetwork {
    /// Number of times the slot behind `target` has been freed. Observers
    /// compare it to tell a reused id from the entity they subscribed to.
    pub fn generation(&self, target: Target) -> u32 {
        let generations = match target {
            Target::Species(id) => self.species_generations.get(id.index()),
            Target::Reaction(id) => self.reaction_generations.get(id.index()),
        };
        generations.copied().unwrap_or(0)
    }

    /// Whether `target` is live and still the entity of `generation`.
    pub fn is_current(&self, target: Target, generation: u32) -> bool {
        let live = match target {
            Target::Species(id) => self.species(id).is_ok(),
            Target::Reaction(id) => self.reaction(id).is_ok(),
        };
        live && self.generation(target) == generation
    }

    pub(crate) fn queue_event(&mut self, event: ChemEvent) {
        let generation = self.generation(event.target());
        self.events.push_back((event, generation));
    }

    /// Marks a freed slot so that its next occupant is told apart from the
    /// entity just removed.
    pub(crate) fn retire(&mut self, target: Target) {
        match target {
            Target::Species(id) => bump_generation(&mut self.species_generations, id.index()),
            Target::Reaction(id) => bump_generation(&mut self.reaction_generations, id.index()),
        }
    }

    pub fn start_signaling_species(&mut self, id: SpeciesId) -> Result<()> {
        self.species_mut(id)?.rspecies_mut().set_signaling(true);
        Ok(())
    }

    pub fn stop_signaling_species(&mut self, id: SpeciesId) -> Result<()> {
        self.species_mut(id)?.rspecies_mut().set_signaling(false);
        Ok(())
    }

    pub fn start_signaling_reaction(&mut self, id: ReactionId) -> Result<()> {
        self.reaction_mut(id)?.set_signaling(true);
        Ok(())
    }

    pub fn stop_signaling_reaction(&mut self, id: ReactionId) -> Result<()> {
        self.reaction_mut(id)?.set_signaling(false);
        Ok(())
    }
}
