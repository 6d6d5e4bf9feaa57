use super::*;
use crate::error::InvariantViolation;
use std::collections::BTreeSet;

/*
 * The dependency graph. Two distinct reactions depend on each other when they
 * share a species, on either side. Upper limit gating makes products matter
 * as much as reactants, so the relation is symmetric.
 */
impl ReactionNetwork {
    /// Registers a freshly inserted reaction with its species and wires it to
    /// every reaction sharing one of them.
    pub(crate) fn link_reaction(&mut self, id: ReactionId) -> Result<()> {
        let reaction = self.reaction(id)?;
        let reactants = reaction.reactants().to_vec();
        let products = reaction.products().to_vec();
        let species = reaction.species();

        for s in reactants {
            self.species_mut(s)?.rspecies_mut().register_as_reactant(id);
        }
        for s in products {
            self.species_mut(s)?.rspecies_mut().register_as_product(id);
        }

        let mut neighbours = BTreeSet::new();
        for s in species {
            neighbours.extend(self.species(s)?.rspecies().involved_in());
        }
        neighbours.remove(&id);
        for neighbour in neighbours {
            self.reaction_mut(neighbour)?.register_new_dependent(id);
            self.reaction_mut(id)?.register_new_dependent(neighbour);
        }
        Ok(())
    }

    /// Inverse of [`ReactionNetwork::link_reaction`].
    pub(crate) fn unlink_reaction(&mut self, id: ReactionId) -> Result<()> {
        let reaction = self.reaction(id)?;
        let reactants = reaction.reactants().to_vec();
        let products = reaction.products().to_vec();
        let neighbours: Vec<ReactionId> = reaction.affected_reactions().iter().copied().collect();

        for neighbour in neighbours {
            if let Ok(neighbour) = self.reaction_mut(neighbour) {
                neighbour.unregister_dependent(id);
            }
        }
        for s in reactants {
            if let Ok(species) = self.species_mut(s) {
                species.rspecies_mut().unregister_as_reactant(id);
            }
        }
        for s in products {
            if let Ok(species) = self.species_mut(s) {
                species.rspecies_mut().unregister_as_product(id);
            }
        }
        self.reaction_mut(id)?.clear_dependents();
        Ok(())
    }

    /// Reactions affected when `id` fires, as stored in the graph.
    pub fn dependents(&self, id: ReactionId) -> Result<&BTreeSet<ReactionId>> {
        Ok(self.reaction(id)?.affected_reactions())
    }

    /// Dependents of `id` derived from species membership alone.
    pub fn derived_dependents(&self, id: ReactionId) -> Result<BTreeSet<ReactionId>> {
        let species = self.reaction(id)?.species();
        let mut derived = BTreeSet::new();
        for other in self.reaction_ids() {
            if other == id {
                continue;
            }
            let shares = self
                .reaction(other)?
                .species()
                .intersection(&species)
                .next()
                .is_some();
            if shares {
                derived.insert(other);
            }
        }
        Ok(derived)
    }

    /// Rebuilds every dependency edge and membership set from the species
    /// lists of the reactions.
    pub fn rebuild_dependencies(&mut self) -> Result<()> {
        for species in self.species.iter_mut().flatten() {
            let rspecies = species.rspecies_mut();
            let involved = rspecies.involved_in();
            for reaction in involved {
                rspecies.unregister_as_reactant(reaction);
                rspecies.unregister_as_product(reaction);
            }
        }
        for reaction in self.reactions.iter_mut().flatten() {
            reaction.clear_dependents();
        }
        let ids: Vec<ReactionId> = self.reaction_ids().collect();
        for id in ids {
            self.link_reaction(id)?;
        }
        Ok(())
    }

    /// Checks the stored graph against species membership, in both
    /// directions, and the membership sets against the reactions.
    pub fn verify_dependencies(&self) -> std::result::Result<(), InvariantViolation> {
        for id in self.reaction_ids() {
            let Ok(reaction) = self.reaction(id) else {
                continue;
            };
            let derived = self
                .derived_dependents(id)
                .map_err(|_| InvariantViolation::MalformedDependency { from: id, to: id })?;
            if let Some(&to) = derived
                .symmetric_difference(reaction.affected_reactions())
                .next()
            {
                return Err(InvariantViolation::MalformedDependency { from: id, to });
            }
            for &s in reaction.reactants() {
                let registered = self
                    .species(s)
                    .is_ok_and(|species| species.rspecies().reactant_of().contains(&id));
                if !registered {
                    return Err(InvariantViolation::MalformedDependency { from: id, to: id });
                }
            }
            for &s in reaction.products() {
                let registered = self
                    .species(s)
                    .is_ok_and(|species| species.rspecies().product_of().contains(&id));
                if !registered {
                    return Err(InvariantViolation::MalformedDependency { from: id, to: id });
                }
            }
        }
        for s in self.species_ids() {
            let Ok(species) = self.species(s) else {
                continue;
            };
            for reaction in species.rspecies().involved_in() {
                let listed = self
                    .reaction(reaction)
                    .is_ok_and(|r| r.species().contains(&s));
                if !listed {
                    return Err(InvariantViolation::MalformedDependency {
                        from: reaction,
                        to: reaction,
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks every cached propensity against a fresh evaluation.
    pub fn verify_propensities(&self, tolerance: f64) -> std::result::Result<(), InvariantViolation> {
        for (i, reaction) in self.reactions.iter().enumerate() {
            let Some(reaction) = reaction else {
                continue;
            };
            let cached = reaction.propensity();
            let recomputed = reaction.evaluate_propensity(|s| species_state(&self.species, s));
            if (cached - recomputed).abs() > tolerance * recomputed.abs().max(1.) {
                return Err(InvariantViolation::PropensityMismatch {
                    reaction: ReactionId(i as u32),
                    cached,
                    recomputed,
                });
            }
        }
        Ok(())
    }
}
