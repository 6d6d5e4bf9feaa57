use crate::composite::NodeId;
use crate::error::InvariantViolation;
use crate::reaction::ReactionId;
use crate::species_registry::NameId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sentinel upper limit meaning the copy number is unbounded.
pub const NO_UPPER_LIMIT: u64 = u64::MAX;

/// Largest copy number any species can hold, whatever its upper limit.
/// Keeps every change between two copy numbers representable as `i64`.
pub const MAX_COPY_NUMBER: u64 = i64::MAX as u64;

/// Stable index of a species inside a [`crate::network::ReactionNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl SpeciesId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "species#{}", self.0)
    }
}

/// The reactive, scheduler-facing part of a species: its copy number, the
/// bound on it, and the reactions it takes part in.
#[derive(Debug, Clone)]
pub struct RSpecies {
    copy_number: u64,
    upper_limit: u64,
    reactant_of: BTreeSet<ReactionId>,
    product_of: BTreeSet<ReactionId>,
    signaling: bool,
}

impl RSpecies {
    pub fn new(id: SpeciesId, copy_number: u64, upper_limit: u64) -> Result<Self, InvariantViolation> {
        if copy_number > upper_limit.min(MAX_COPY_NUMBER) {
            return Err(InvariantViolation::OverflowBound {
                species: id,
                requested: copy_number,
                upper_limit: upper_limit.min(MAX_COPY_NUMBER),
            });
        }
        Ok(RSpecies {
            copy_number,
            upper_limit,
            reactant_of: BTreeSet::new(),
            product_of: BTreeSet::new(),
            signaling: false,
        })
    }

    pub fn copy_number(&self) -> u64 {
        self.copy_number
    }

    pub fn upper_limit(&self) -> u64 {
        self.upper_limit
    }

    /// The bound actually enforced: the upper limit, capped at
    /// [`MAX_COPY_NUMBER`].
    pub fn capacity(&self) -> u64 {
        self.upper_limit.min(MAX_COPY_NUMBER)
    }

    /// Copy number after adding `delta`, or the violation it would cause.
    pub fn checked_delta(&self, id: SpeciesId, delta: i64) -> Result<u64, InvariantViolation> {
        if delta < 0 {
            let by = delta.unsigned_abs();
            return self
                .copy_number
                .checked_sub(by)
                .ok_or(InvariantViolation::Underflow {
                    species: id,
                    copy_number: self.copy_number,
                    by,
                });
        }
        let requested = self.copy_number.saturating_add(delta as u64);
        if requested > self.capacity() {
            return Err(InvariantViolation::OverflowBound {
                species: id,
                requested,
                upper_limit: self.capacity(),
            });
        }
        Ok(requested)
    }

    pub fn increase_copy_number(&mut self, id: SpeciesId, by: u64) -> Result<u64, InvariantViolation> {
        let requested = self.copy_number.saturating_add(by);
        if requested > self.capacity() {
            return Err(InvariantViolation::OverflowBound {
                species: id,
                requested,
                upper_limit: self.capacity(),
            });
        }
        self.copy_number = requested;
        Ok(self.copy_number)
    }

    pub fn decrease_copy_number(&mut self, id: SpeciesId, by: u64) -> Result<u64, InvariantViolation> {
        self.copy_number = self
            .copy_number
            .checked_sub(by)
            .ok_or(InvariantViolation::Underflow {
                species: id,
                copy_number: self.copy_number,
                by,
            })?;
        Ok(self.copy_number)
    }

    pub fn set_copy_number(&mut self, id: SpeciesId, copy_number: u64) -> Result<(), InvariantViolation> {
        if copy_number > self.capacity() {
            return Err(InvariantViolation::OverflowBound {
                species: id,
                requested: copy_number,
                upper_limit: self.capacity(),
            });
        }
        self.copy_number = copy_number;
        Ok(())
    }

    /// Lowering the limit below the current copy number is rejected.
    pub fn set_upper_limit(&mut self, id: SpeciesId, upper_limit: u64) -> Result<(), InvariantViolation> {
        if self.copy_number > upper_limit {
            return Err(InvariantViolation::OverflowBound {
                species: id,
                requested: self.copy_number,
                upper_limit,
            });
        }
        self.upper_limit = upper_limit;
        Ok(())
    }

    pub fn register_as_reactant(&mut self, reaction: ReactionId) {
        self.reactant_of.insert(reaction);
    }

    pub fn register_as_product(&mut self, reaction: ReactionId) {
        self.product_of.insert(reaction);
    }

    pub fn unregister_as_reactant(&mut self, reaction: ReactionId) -> bool {
        self.reactant_of.remove(&reaction)
    }

    pub fn unregister_as_product(&mut self, reaction: ReactionId) -> bool {
        self.product_of.remove(&reaction)
    }

    pub fn reactant_of(&self) -> &BTreeSet<ReactionId> {
        &self.reactant_of
    }

    pub fn product_of(&self) -> &BTreeSet<ReactionId> {
        &self.product_of
    }

    /// Every reaction whose propensity may depend on this copy number.
    pub fn involved_in(&self) -> BTreeSet<ReactionId> {
        self.reactant_of.union(&self.product_of).copied().collect()
    }

    pub fn is_referenced(&self) -> bool {
        !self.reactant_of.is_empty() || !self.product_of.is_empty()
    }

    pub fn is_signaling(&self) -> bool {
        self.signaling
    }

    pub fn set_signaling(&mut self, signaling: bool) {
        self.signaling = signaling;
    }
}

/// The externally addressable, named species. Owns its [`RSpecies`].
#[derive(Debug, Clone)]
pub struct Species {
    name: NameId,
    scope: NodeId,
    rspecies: RSpecies,
}

impl Species {
    pub fn new(name: NameId, scope: NodeId, rspecies: RSpecies) -> Self {
        Species {
            name,
            scope,
            rspecies,
        }
    }

    pub fn name_id(&self) -> NameId {
        self.name
    }

    pub fn scope(&self) -> NodeId {
        self.scope
    }

    pub fn rspecies(&self) -> &RSpecies {
        &self.rspecies
    }

    pub fn rspecies_mut(&mut self) -> &mut RSpecies {
        &mut self.rspecies
    }

    pub fn copy_number(&self) -> u64 {
        self.rspecies.copy_number()
    }
}
