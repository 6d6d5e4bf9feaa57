use crate::reaction::ReactionId;
use crate::species::SpeciesId;

/// The species and reactions owned by one scope, in insertion order.
///
/// A container only records membership; the entities themselves live in the
/// [`crate::network::ReactionNetwork`] arenas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    species: Vec<SpeciesId>,
    reactions: Vec<ReactionId>,
}

impl Container {
    pub fn new() -> Self {
        Container::default()
    }

    pub fn species(&self) -> &[SpeciesId] {
        &self.species
    }

    pub fn reactions(&self) -> &[ReactionId] {
        &self.reactions
    }

    pub fn number_of_species(&self) -> usize {
        self.species.len()
    }

    pub fn number_of_reactions(&self) -> usize {
        self.reactions.len()
    }

    pub fn contains_species(&self, species: SpeciesId) -> bool {
        self.species.contains(&species)
    }

    pub fn contains_reaction(&self, reaction: ReactionId) -> bool {
        self.reactions.contains(&reaction)
    }

    pub(crate) fn push_species(&mut self, species: SpeciesId) {
        self.species.push(species);
    }

    pub(crate) fn push_reaction(&mut self, reaction: ReactionId) {
        self.reactions.push(reaction);
    }

    pub(crate) fn remove_species(&mut self, species: SpeciesId) -> bool {
        let before = self.species.len();
        self.species.retain(|&s| s != species);
        before != self.species.len()
    }

    pub(crate) fn remove_reaction(&mut self, reaction: ReactionId) -> bool {
        let before = self.reactions.len();
        self.reactions.retain(|&r| r != reaction);
        before != self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty() && self.reactions.is_empty()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut container = Container::new();
        container.push_reaction(ReactionId(3));
        container.push_reaction(ReactionId(1));
        container.push_species(SpeciesId(7));
        assert_eq!(container.reactions(), &[ReactionId(3), ReactionId(1)]);
        assert!(container.remove_reaction(ReactionId(3)));
        assert!(!container.remove_reaction(ReactionId(3)));
        assert_eq!(container.number_of_reactions(), 1);
        assert!(container.contains_species(SpeciesId(7)));
        assert!(container.remove_species(SpeciesId(7)));
        assert!(!container.is_empty());
    }
}
