use super::*;
use crate::reaction::ReactionKind;
use crate::species::RSpecies;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;
use tracing::{debug, warn};

/*
 * Scopes
 */
impl ReactionNetwork {
    pub fn add_scope(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let id = self.scopes.add_child(parent, name, Container::new())?;
        debug!(scope = %id, name, "added scope");
        Ok(id)
    }

    pub fn scope_name(&self, scope: NodeId) -> Result<&str> {
        self.scopes.name(scope)
    }

    pub fn container(&self, scope: NodeId) -> Result<&Container> {
        self.scopes.get(scope)
    }

    /// Finds a scope by name among the children of `parent`.
    pub fn find_scope(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.scopes
            .children(parent)
            .ok()?
            .iter()
            .copied()
            .find(|&child| self.scopes.name(child).is_ok_and(|n| n == name))
    }

    /// Number of species in `scope` and all scopes below it.
    pub fn count_species(&self, scope: NodeId) -> Result<usize> {
        let mut count = 0;
        self.scopes.apply(scope, |_, container| {
            count += container.number_of_species();
            true
        })?;
        Ok(count)
    }

    /// Number of reactions in `scope` and all scopes below it.
    pub fn count_reactions(&self, scope: NodeId) -> Result<usize> {
        let mut count = 0;
        self.scopes.apply(scope, |_, container| {
            count += container.number_of_reactions();
            true
        })?;
        Ok(count)
    }

    /// Removes a scope with everything below it. Reactions elsewhere that
    /// reference a species of the removed subtree are removed as well.
    pub fn remove_scope(&mut self, scope: NodeId) -> Result<()> {
        if self.scopes.is_root(scope)? {
            return Err(ChemError::UnknownScope(scope.0));
        }

        let mut doomed_species = Vec::new();
        let mut doomed_reactions = BTreeSet::new();
        for node in self.scopes.subtree(scope)? {
            let container = self.scopes.get(node)?;
            doomed_species.extend_from_slice(container.species());
            doomed_reactions.extend(container.reactions().iter().copied());
        }
        for &s in doomed_species.iter() {
            doomed_reactions.extend(self.species(s)?.rspecies().involved_in());
        }

        for reaction in doomed_reactions {
            self.detach_reaction(reaction)?;
        }
        for s in doomed_species {
            self.detach_species(s)?;
        }
        self.scopes.remove_subtree(scope)?;
        debug!(scope = %scope, "removed scope");
        Ok(())
    }

    /// Empties the container of `scope` without touching its child scopes.
    /// Reactions elsewhere that use one of its species go with it.
    pub fn clear_scope(&mut self, scope: NodeId) -> Result<()> {
        let container = self.scopes.get(scope)?;
        let species = container.species().to_vec();
        let mut reactions: BTreeSet<ReactionId> = container.reactions().iter().copied().collect();
        for &s in species.iter() {
            reactions.extend(self.species(s)?.rspecies().involved_in());
        }
        for &reaction in reactions.iter() {
            self.detach_reaction(reaction)?;
        }
        for s in species {
            self.detach_species(s)?;
        }
        debug!(scope = %scope, reactions = reactions.len(), "cleared scope");
        Ok(())
    }

    /// Removes every scope below the root and every species and reaction,
    /// then empties the name registry. Removals are logged and signaled as
    /// if done one by one.
    pub fn clear(&mut self) -> Result<()> {
        let root = self.root();
        let children = self.scopes.children(root)?.to_vec();
        for child in children {
            self.remove_scope(child)?;
        }
        self.clear_scope(root)?;
        self.registry.clear();
        debug!("cleared network");
        Ok(())
    }

    /// Re-parents `scope`. Species and reactions keep their identifiers.
    pub fn move_scope(&mut self, scope: NodeId, new_parent: NodeId) -> Result<()> {
        self.scopes.transfer_child(scope, new_parent)
    }

    /// Copies the species and reactions of `source` into a new scope under
    /// `parent`. Reactions are rewired to the copied species; references to
    /// species outside `source` are kept as they are.
    pub fn clone_scope(&mut self, source: NodeId, parent: NodeId, name: &str) -> Result<NodeId> {
        let container = self.scopes.get(source)?.clone();
        self.scopes.get(parent)?;
        let target = self.add_scope(parent, name)?;

        let mut mapping = HashMap::new();
        for &s in container.species() {
            let species = self.species(s)?;
            let copy_number = species.copy_number();
            let upper_limit = species.rspecies().upper_limit();
            let species_name = self.species_name(s)?.to_string();
            let copy = self.add_species(target, &species_name, copy_number, upper_limit)?;
            mapping.insert(s, copy);
        }
        for &r in container.reactions() {
            let clone = self
                .reaction(r)?
                .clone_into(target, |s| mapping.get(&s).copied().unwrap_or(s))?;
            self.insert_reaction(clone)?;
        }
        debug!(source = %source, target = %target, "cloned scope");
        Ok(target)
    }

    /// Multi-line listing of a scope subtree: species with copy numbers,
    /// then reactions with rates and propensities.
    pub fn describe_scope(&self, scope: NodeId) -> Result<String> {
        let mut out = String::new();
        for node in self.scopes.subtree(scope)? {
            let depth = self.scopes.ancestry(node)?.len() - self.scopes.ancestry(scope)?.len();
            let indent = "  ".repeat(depth);
            let container = self.scopes.get(node)?;
            let _ = writeln!(out, "{indent}{} ({node})", self.scopes.name(node)?);
            for &s in container.species() {
                let _ = writeln!(
                    out,
                    "{indent}  {}[{}]",
                    self.species_name(s)?,
                    self.copy_number(s)?
                );
            }
            for &r in container.reactions() {
                let _ = writeln!(out, "{indent}  {}", self.describe_reaction(r)?);
            }
        }
        Ok(out)
    }

    pub fn describe_reaction(&self, id: ReactionId) -> Result<String> {
        let reaction = self.reaction(id)?;
        let side = |species: &[SpeciesId]| -> Result<String> {
            if species.is_empty() {
                return Ok("0".to_string());
            }
            let names = species
                .iter()
                .map(|&s| self.species_name(s))
                .collect::<Result<Vec<_>>>()?;
            Ok(names.join(" + "))
        };
        let arrow = match reaction.kind() {
            ReactionKind::Regular => "->",
            ReactionKind::Diffusion => "~>",
        };
        Ok(format!(
            "{} {arrow} {} (rate {}, propensity {}{})",
            side(reaction.reactants())?,
            side(reaction.products())?,
            reaction.rate(),
            reaction.propensity(),
            if reaction.is_passivated() { ", passivated" } else { "" }
        ))
    }
}

/*
 * Species
 */
impl ReactionNetwork {
    pub fn add_species(
        &mut self,
        scope: NodeId,
        name: &str,
        copy_number: u64,
        upper_limit: u64,
    ) -> Result<SpeciesId> {
        self.scopes.get(scope)?;
        let id = match self.free_species.last() {
            Some(&index) => SpeciesId(index),
            None => SpeciesId(self.species.len() as u32),
        };
        let rspecies = RSpecies::new(id, copy_number, upper_limit)?;

        let name_id = self.registry.acquire(name);
        let species = Species::new(name_id, scope, rspecies);
        if self.free_species.pop().is_some() {
            self.species[id.index()] = Some(species);
        } else {
            self.species.push(Some(species));
        }
        self.scopes.get_mut(scope)?.push_species(id);
        debug!(species = %id, name, copy_number, "added species");
        Ok(id)
    }

    /// Like [`ReactionNetwork::add_species`], rejecting a name already used
    /// in the same scope.
    pub fn add_species_unique(
        &mut self,
        scope: NodeId,
        name: &str,
        copy_number: u64,
        upper_limit: u64,
    ) -> Result<SpeciesId> {
        if self.find_species(scope, name).is_some() {
            return Err(ChemError::DuplicateEntity(format!(
                "species {name} in {}",
                self.scopes.name(scope)?
            )));
        }
        self.add_species(scope, name, copy_number, upper_limit)
    }

    /// Looks a species up by name in `scope` only.
    pub fn find_species(&self, scope: NodeId, name: &str) -> Option<SpeciesId> {
        let name_id = self.registry.string_to_int(name)?;
        self.scopes
            .get(scope)
            .ok()?
            .species()
            .iter()
            .copied()
            .find(|&s| self.species(s).is_ok_and(|species| species.name_id() == name_id))
    }

    /// Looks a species up by name in `scope`, then in its ancestors.
    pub fn resolve_species(&self, scope: NodeId, name: &str) -> Result<SpeciesId> {
        for node in self.scopes.ancestry(scope)? {
            if let Some(id) = self.find_species(node, name) {
                return Ok(id);
            }
        }
        Err(ChemError::UnknownSpecies(name.to_string()))
    }

    /// Removes an unreferenced species. A species still used by a reaction
    /// is left in place and `SpeciesInUse` is returned.
    pub fn remove_species(&mut self, id: SpeciesId) -> Result<()> {
        let rspecies = self.species(id)?.rspecies();
        if rspecies.is_referenced() {
            let reactions = rspecies.involved_in().len();
            warn!(species = %id, reactions, "refusing to remove a species in use");
            return Err(ChemError::SpeciesInUse {
                species: id,
                reactions,
            });
        }
        self.detach_species(id)
    }

    /// Removes a species together with every reaction referencing it.
    /// Returns the removed reactions.
    pub fn remove_species_cascade(&mut self, id: SpeciesId) -> Result<Vec<ReactionId>> {
        let reactions: Vec<ReactionId> = self.species(id)?.rspecies().involved_in().into_iter().collect();
        for &reaction in reactions.iter() {
            self.detach_reaction(reaction)?;
        }
        self.detach_species(id)?;
        Ok(reactions)
    }

    fn detach_species(&mut self, id: SpeciesId) -> Result<()> {
        let species = self
            .species
            .get_mut(id.index())
            .and_then(|s| s.take())
            .ok_or_else(|| ChemError::UnknownSpecies(id.to_string()))?;
        self.free_species.push(id.0);
        self.registry.release(species.name_id());
        if let Ok(container) = self.scopes.get_mut(species.scope()) {
            container.remove_species(id);
        }
        if species.rspecies().is_signaling() {
            self.queue_event(ChemEvent::SpeciesRemoved { species: id });
        }
        self.retire(Target::Species(id));
        debug!(species = %id, "removed species");
        Ok(())
    }
}

/*
 * Reactions
 */
impl ReactionNetwork {
    pub fn add_reaction(
        &mut self,
        scope: NodeId,
        reactants: &[SpeciesId],
        products: &[SpeciesId],
        rate: f64,
    ) -> Result<ReactionId> {
        self.add_reaction_of_kind(scope, ReactionKind::Regular, reactants, products, rate)
    }

    pub fn add_reaction_of_kind(
        &mut self,
        scope: NodeId,
        kind: ReactionKind,
        reactants: &[SpeciesId],
        products: &[SpeciesId],
        rate: f64,
    ) -> Result<ReactionId> {
        let reaction = self.build_reaction(scope, kind, reactants, products, rate)?;
        self.insert_reaction(reaction)
    }

    /// Like [`ReactionNetwork::add_reaction`], rejecting a reaction equal to
    /// one already in the scope.
    pub fn add_reaction_unique(
        &mut self,
        scope: NodeId,
        reactants: &[SpeciesId],
        products: &[SpeciesId],
        rate: f64,
    ) -> Result<ReactionId> {
        let reaction = self.build_reaction(scope, ReactionKind::Regular, reactants, products, rate)?;
        let duplicate = self.scopes.get(scope)?.reactions().iter().any(|&existing| {
            self.reaction(existing)
                .is_ok_and(|existing| existing.same_as(&reaction))
        });
        if duplicate {
            return Err(ChemError::DuplicateEntity(format!(
                "reaction in {}",
                self.scopes.name(scope)?
            )));
        }
        self.insert_reaction(reaction)
    }

    /// Adds a reaction naming its species. Names are looked up in `scope`
    /// first and then in its ancestors.
    pub fn add_reaction_by_name(
        &mut self,
        scope: NodeId,
        reactants: &[&str],
        products: &[&str],
        rate: f64,
    ) -> Result<ReactionId> {
        let reactants = reactants
            .iter()
            .map(|name| self.resolve_species(scope, name))
            .collect::<Result<Vec<_>>>()?;
        let products = products
            .iter()
            .map(|name| self.resolve_species(scope, name))
            .collect::<Result<Vec<_>>>()?;
        self.add_reaction(scope, &reactants, &products, rate)
    }

    /// Adds a one-copy transfer `from -> to` with propensity `rate * n_from`.
    pub fn add_diffusion_reaction(
        &mut self,
        scope: NodeId,
        from: SpeciesId,
        to: SpeciesId,
        rate: f64,
    ) -> Result<ReactionId> {
        self.add_reaction_of_kind(scope, ReactionKind::Diffusion, &[from], &[to], rate)
    }

    fn build_reaction(
        &self,
        scope: NodeId,
        kind: ReactionKind,
        reactants: &[SpeciesId],
        products: &[SpeciesId],
        rate: f64,
    ) -> Result<Reaction> {
        self.scopes.get(scope)?;
        for &s in reactants.iter().chain(products.iter()) {
            self.species(s)?;
        }
        Reaction::new(kind, reactants.to_vec(), products.to_vec(), rate, scope)
    }

    pub(crate) fn insert_reaction(&mut self, reaction: Reaction) -> Result<ReactionId> {
        let scope = reaction.scope();
        let id = match self.free_reactions.pop() {
            Some(index) => {
                self.reactions[index as usize] = Some(reaction);
                ReactionId(index)
            }
            None => {
                self.reactions.push(Some(reaction));
                ReactionId(self.reactions.len() as u32 - 1)
            }
        };
        self.link_reaction(id)?;
        let species = &self.species;
        if let Some(reaction) = self.reactions[id.index()].as_mut() {
            reaction.compute_propensity(|s| species_state(species, s));
        }
        self.scopes.get_mut(scope)?.push_reaction(id);
        self.changes.push(NetworkChange::ReactionAdded(id));
        debug!(reaction = %id, scope = %scope, "added reaction");
        Ok(id)
    }

    pub fn remove_reaction(&mut self, id: ReactionId) -> Result<()> {
        self.detach_reaction(id)
    }

    fn detach_reaction(&mut self, id: ReactionId) -> Result<()> {
        self.unlink_reaction(id)?;
        let reaction = self
            .reactions
            .get_mut(id.index())
            .and_then(|r| r.take())
            .ok_or(ChemError::UnknownReaction(id))?;
        self.free_reactions.push(id.0);
        if let Ok(container) = self.scopes.get_mut(reaction.scope()) {
            container.remove_reaction(id);
        }
        self.changes.push(NetworkChange::ReactionRemoved(id));
        if reaction.is_signaling() {
            self.queue_event(ChemEvent::ReactionRemoved { reaction: id });
        }
        self.retire(Target::Reaction(id));
        debug!(reaction = %id, "removed reaction");
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::species::NO_UPPER_LIMIT;

    #[test]
    fn unique_species_per_scope() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let cell = network.add_scope(root, "cell").unwrap();
        network.add_species_unique(root, "A", 1, NO_UPPER_LIMIT).unwrap();
        network.add_species_unique(cell, "A", 1, NO_UPPER_LIMIT).unwrap();

        let err = network.add_species_unique(root, "A", 5, NO_UPPER_LIMIT);
        assert!(matches!(err, Err(ChemError::DuplicateEntity(_))));
        assert_eq!(network.count_species(root).unwrap(), 2);
        assert_eq!(network.count_species(cell).unwrap(), 1);
    }

    #[test]
    fn unique_reactions_per_scope() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 1, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(root, "B", 1, NO_UPPER_LIMIT).unwrap();
        network.add_reaction_unique(root, &[a], &[b], 1.0).unwrap();
        network.take_changes();

        let err = network.add_reaction_unique(root, &[a], &[b], 1.0);
        assert!(matches!(err, Err(ChemError::DuplicateEntity(_))));
        assert_eq!(network.number_of_reactions(), 1);
        assert!(network.take_changes().is_empty());

        network.add_reaction_unique(root, &[a], &[b], 2.0).unwrap();
        assert_eq!(network.number_of_reactions(), 2);
    }

    #[test]
    fn names_resolve_through_ancestors() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let cell = network.add_scope(root, "cell").unwrap();
        let outer = network.add_species(root, "ATP", 10, NO_UPPER_LIMIT).unwrap();
        let inner = network.add_species(cell, "ADP", 0, NO_UPPER_LIMIT).unwrap();

        let r = network
            .add_reaction_by_name(cell, &["ATP"], &["ADP"], 1.0)
            .unwrap();
        let reaction = network.reaction(r).unwrap();
        assert_eq!(reaction.reactants(), &[outer]);
        assert_eq!(reaction.products(), &[inner]);
        assert_eq!(reaction.scope(), cell);

        let missing = network.add_reaction_by_name(root, &["ADP"], &[], 1.0);
        assert!(matches!(missing, Err(ChemError::UnknownSpecies(name)) if name == "ADP"));
    }

    #[test]
    fn species_removal_policies() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 1, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(root, "B", 1, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(root, &[a], &[b], 1.0).unwrap();

        let err = network.remove_species(a);
        assert!(matches!(err, Err(ChemError::SpeciesInUse { reactions: 1, .. })));
        assert!(network.contains_reaction(r));

        assert_eq!(network.remove_species_cascade(a).unwrap(), vec![r]);
        assert!(!network.contains_reaction(r));
        assert!(network.species(a).is_err());
        assert!(!network.species(b).unwrap().rspecies().is_referenced());
        network.remove_species(b).unwrap();
        assert_eq!(network.number_of_species(), 0);
        assert!(network.registry().is_empty());
    }

    #[test]
    fn freed_ids_are_reused() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 1, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(root, &[a], &[], 1.0).unwrap();
        network.remove_reaction(r).unwrap();
        let again = network.add_reaction(root, &[], &[a], 1.0).unwrap();
        assert_eq!(again, r);
        assert_eq!(
            network.take_changes(),
            vec![
                NetworkChange::ReactionAdded(r),
                NetworkChange::ReactionRemoved(r),
                NetworkChange::ReactionAdded(r),
            ]
        );
    }

    #[test]
    fn removing_a_scope_cascades() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let cell = network.add_scope(root, "cell").unwrap();
        let nucleus = network.add_scope(cell, "nucleus").unwrap();
        let outside = network.add_species(root, "A", 5, NO_UPPER_LIMIT).unwrap();
        let inside = network.add_species(nucleus, "A", 0, NO_UPPER_LIMIT).unwrap();
        let import = network.add_diffusion_reaction(root, outside, inside, 1.0).unwrap();
        network.add_reaction(nucleus, &[inside], &[], 1.0).unwrap();

        network.remove_scope(cell).unwrap();
        assert!(!network.contains_reaction(import));
        assert_eq!(network.number_of_reactions(), 0);
        assert_eq!(network.number_of_species(), 1);
        assert!(network.scopes().children(root).unwrap().is_empty());
        assert!(network.remove_scope(root).is_err());
        network.verify_dependencies().unwrap();
    }

    #[test]
    fn clearing_keeps_the_scope_and_its_children() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let cell = network.add_scope(root, "cell").unwrap();
        let nucleus = network.add_scope(cell, "nucleus").unwrap();
        let outside = network.add_species(root, "A", 5, NO_UPPER_LIMIT).unwrap();
        let a = network.add_species(cell, "A", 2, NO_UPPER_LIMIT).unwrap();
        let kept = network.add_species(nucleus, "B", 1, NO_UPPER_LIMIT).unwrap();
        let import = network.add_reaction(root, &[outside], &[a], 1.0).unwrap();
        let decay = network.add_reaction(nucleus, &[kept], &[], 1.0).unwrap();

        network.clear_scope(cell).unwrap();
        assert!(network.container(cell).unwrap().is_empty());
        assert!(!network.contains_reaction(import));
        assert!(network.contains_reaction(decay));
        assert_eq!(network.find_scope(cell, "nucleus"), Some(nucleus));
        assert_eq!(network.number_of_species(), 2);

        network.move_scope(nucleus, root).unwrap();
        assert_eq!(network.scopes().parent(nucleus).unwrap(), Some(root));
        assert!(network.move_scope(root, nucleus).is_err());
        network.verify_dependencies().unwrap();
    }

    #[test]
    fn clearing_the_whole_network() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let cell = network.add_scope(root, "cell").unwrap();
        let a = network.add_species(root, "A", 5, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(cell, "B", 0, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(cell, &[a], &[b], 1.0).unwrap();
        network.start_signaling_reaction(r).unwrap();
        network.take_changes();

        network.clear().unwrap();
        assert_eq!(network.number_of_species(), 0);
        assert_eq!(network.number_of_reactions(), 0);
        assert!(network.registry().is_empty());
        assert_eq!(network.registry().string_to_int("A"), None);
        assert!(network.scopes().children(root).unwrap().is_empty());
        assert_eq!(network.take_changes(), vec![NetworkChange::ReactionRemoved(r)]);
        assert_eq!(network.drain_events(), vec![ChemEvent::ReactionRemoved { reaction: r }]);
        assert_eq!(network.generation(Target::Reaction(r)), 1);

        let again = network.add_species(root, "A", 1, NO_UPPER_LIMIT).unwrap();
        assert!(!network.is_current(Target::Species(again), 0));
        assert!(network.is_current(Target::Species(again), network.generation(Target::Species(again))));
    }

    #[test]
    fn cloning_a_scope_rewires_local_species() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let template = network.add_scope(root, "template").unwrap();
        let food = network.add_species(root, "food", 7, NO_UPPER_LIMIT).unwrap();
        let a = network.add_species(template, "A", 3, 10).unwrap();
        network.add_reaction(template, &[food], &[a], 1.0).unwrap();

        let copy = network.clone_scope(template, root, "copy").unwrap();
        let copied_a = network.find_species(copy, "A").unwrap();
        assert_ne!(copied_a, a);
        assert_eq!(network.copy_number(copied_a).unwrap(), 3);
        assert_eq!(network.upper_limit(copied_a).unwrap(), 10);

        let container = network.container(copy).unwrap();
        let cloned = network.reaction(container.reactions()[0]).unwrap();
        assert_eq!(cloned.reactants(), &[food]);
        assert_eq!(cloned.products(), &[copied_a]);
        assert_eq!(cloned.propensity(), 7.);
        assert_eq!(network.count_reactions(root).unwrap(), 2);
        network.verify_dependencies().unwrap();
    }

    #[test]
    fn describing_a_scope() {
        let mut network = ReactionNetwork::new("cell");
        let root = network.root();
        let a = network.add_species(root, "A", 3, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(root, "B", 0, NO_UPPER_LIMIT).unwrap();
        network.add_reaction(root, &[a, a], &[b], 1.0).unwrap();
        let description = network.describe_scope(root).unwrap();
        assert!(description.starts_with("cell (scope#0)"));
        assert!(description.contains("A[3]"));
        assert!(description.contains("A + A -> B (rate 1, propensity 6)"));
    }
}
