use crate::composite::NodeId;
use crate::error::ChemError;
use crate::species::SpeciesId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const MAX_REACTANTS: usize = 3;
pub const MAX_PRODUCTS: usize = 4;

/// Stable index of a reaction inside a [`crate::network::ReactionNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReactionId(pub u32);

impl ReactionId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reaction#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReactionKind {
    #[default]
    Regular,
    /// Transfer of one copy between two species, usually the same chemical
    /// in two neighbouring scopes.
    Diffusion,
}

impl ReactionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReactionKind::Regular => "regular",
            ReactionKind::Diffusion => "diffusion",
        }
    }
}

/// Reactant side of the rate law. `Second { homo: true }` is the 2A case
/// whose combinatorial factor is n(n-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Zeroth,
    First,
    Second { homo: bool },
    Third,
}

impl Arity {
    pub fn classify(
        kind: ReactionKind,
        reactants: &[SpeciesId],
        products: &[SpeciesId],
    ) -> Result<Arity, ChemError> {
        let invalid = || ChemError::InvalidArity {
            reactants: reactants.len(),
            products: products.len(),
            kind: kind.name(),
        };
        match kind {
            ReactionKind::Diffusion => {
                if reactants.len() != 1 || products.len() != 1 {
                    return Err(invalid());
                }
                Ok(Arity::First)
            }
            ReactionKind::Regular => {
                if products.len() > MAX_PRODUCTS || (reactants.is_empty() && products.is_empty()) {
                    return Err(invalid());
                }
                match reactants {
                    [] => Ok(Arity::Zeroth),
                    [_] => Ok(Arity::First),
                    [a, b] => Ok(Arity::Second { homo: a == b }),
                    [_, _, _] => Ok(Arity::Third),
                    _ => Err(invalid()),
                }
            }
        }
    }
}

fn falling_factorial(n: u64, k: u64) -> f64 {
    let mut product = 1.0;
    for i in 0..k {
        if n < i + 1 {
            return 0.0;
        }
        product *= (n - i) as f64;
    }
    product
}

/// One reaction channel. Species are referenced by id; a species listed twice
/// is consumed (or produced) twice per firing.
#[derive(Debug, Clone)]
pub struct Reaction {
    kind: ReactionKind,
    arity: Arity,
    reactants: Vec<SpeciesId>,
    products: Vec<SpeciesId>,
    reactant_counts: Vec<(SpeciesId, u64)>,
    net_change: Vec<(SpeciesId, i64)>,
    rate: f64,
    propensity: f64,
    passivated: bool,
    signaling: bool,
    dependents: BTreeSet<ReactionId>,
    scope: NodeId,
}

/*
 * Constructors
 */
impl Reaction {
    pub fn new(
        kind: ReactionKind,
        reactants: Vec<SpeciesId>,
        products: Vec<SpeciesId>,
        rate: f64,
        scope: NodeId,
    ) -> Result<Self, ChemError> {
        let arity = Arity::classify(kind, &reactants, &products)?;
        if !rate.is_finite() || rate < 0. {
            return Err(ChemError::InvalidRate(rate));
        }

        let mut counts: BTreeMap<SpeciesId, u64> = BTreeMap::new();
        let mut net: BTreeMap<SpeciesId, i64> = BTreeMap::new();
        for &species in reactants.iter() {
            *counts.entry(species).or_insert(0) += 1;
            *net.entry(species).or_insert(0) -= 1;
        }
        for &species in products.iter() {
            *net.entry(species).or_insert(0) += 1;
        }

        Ok(Reaction {
            kind,
            arity,
            reactants,
            products,
            reactant_counts: counts.into_iter().collect(),
            net_change: net.into_iter().filter(|&(_, delta)| delta != 0).collect(),
            rate,
            propensity: 0.,
            passivated: false,
            signaling: false,
            dependents: BTreeSet::new(),
            scope,
        })
    }

    /// Copy of this reaction with species remapped and without any
    /// dependency edges or scheduling state.
    pub fn clone_into(&self, scope: NodeId, map: impl Fn(SpeciesId) -> SpeciesId) -> Result<Self, ChemError> {
        let mut clone = Reaction::new(
            self.kind,
            self.reactants.iter().map(|&s| map(s)).collect(),
            self.products.iter().map(|&s| map(s)).collect(),
            self.rate,
            scope,
        )?;
        clone.passivated = self.passivated;
        Ok(clone)
    }
}

/*
 * Access to data
 */
impl Reaction {
    pub fn kind(&self) -> ReactionKind {
        self.kind
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn reactants(&self) -> &[SpeciesId] {
        &self.reactants
    }

    pub fn products(&self) -> &[SpeciesId] {
        &self.products
    }

    /// Distinct species touched by this reaction, in id order.
    pub fn species(&self) -> BTreeSet<SpeciesId> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .copied()
            .collect()
    }

    /// Net change in copy number per firing, zero entries omitted.
    pub fn net_change(&self) -> &[(SpeciesId, i64)] {
        &self.net_change
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn propensity(&self) -> f64 {
        self.propensity
    }

    pub fn is_passivated(&self) -> bool {
        self.passivated
    }

    pub fn is_signaling(&self) -> bool {
        self.signaling
    }

    pub fn scope(&self) -> NodeId {
        self.scope
    }

    pub fn affected_reactions(&self) -> &BTreeSet<ReactionId> {
        &self.dependents
    }

    /// Equality used for deduplication: same kind, same ordered species lists
    /// and the same rate.
    pub fn same_as(&self, other: &Reaction) -> bool {
        self.kind == other.kind
            && self.reactants == other.reactants
            && self.products == other.products
            && self.rate == other.rate
    }
}

/*
 * Evolution
 */
impl Reaction {
    /// Propensity for the given species state. `state` maps a species to its
    /// `(copy_number, upper_limit)`.
    pub fn evaluate_propensity(&self, state: impl Fn(SpeciesId) -> (u64, u64)) -> f64 {
        if self.passivated {
            return 0.;
        }
        for &(species, delta) in self.net_change.iter() {
            if delta <= 0 {
                continue;
            }
            let (n, upper_limit) = state(species);
            if n.saturating_add(delta as u64) > upper_limit {
                return 0.;
            }
        }

        let n = |species: SpeciesId| state(species).0;
        let combinations = match self.arity {
            Arity::Zeroth => 1.,
            Arity::First => n(self.reactants[0]) as f64,
            Arity::Second { homo: true } => falling_factorial(n(self.reactants[0]), 2),
            Arity::Second { homo: false } => {
                n(self.reactants[0]) as f64 * n(self.reactants[1]) as f64
            }
            Arity::Third => self
                .reactant_counts
                .iter()
                .map(|&(species, k)| falling_factorial(n(species), k))
                .product(),
        };
        self.rate * combinations
    }

    /// Recomputes and caches the propensity. Returns the new value.
    pub fn compute_propensity(&mut self, state: impl Fn(SpeciesId) -> (u64, u64)) -> f64 {
        self.propensity = self.evaluate_propensity(state);
        self.propensity
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<(), ChemError> {
        if !rate.is_finite() || rate < 0. {
            return Err(ChemError::InvalidRate(rate));
        }
        self.rate = rate;
        Ok(())
    }

    /// Pins the propensity at zero until [`Reaction::activate`] is called.
    pub fn passivate(&mut self) {
        self.passivated = true;
        self.propensity = 0.;
    }

    pub fn activate(&mut self) {
        self.passivated = false;
    }

    pub fn set_signaling(&mut self, signaling: bool) {
        self.signaling = signaling;
    }

    pub fn register_new_dependent(&mut self, reaction: ReactionId) -> bool {
        self.dependents.insert(reaction)
    }

    pub fn unregister_dependent(&mut self, reaction: ReactionId) -> bool {
        self.dependents.remove(&reaction)
    }

    pub fn clear_dependents(&mut self) {
        self.dependents.clear();
    }
}
