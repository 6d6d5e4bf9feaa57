use crate::composite::NodeId;
use crate::ending_criterion::EndingCriterion;
use crate::error::{ChemError, Result};
use crate::network::ReactionNetwork;
use crate::reaction::ReactionKind;
use crate::scheduler::SchedulerKind;
use crate::species::{SpeciesId, NO_UPPER_LIMIT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

fn default_root() -> String {
    "root".to_string()
}

fn default_trials() -> usize {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpeciesDescription {
    pub name: String,
    #[serde(default)]
    pub copy_number: u64,
    #[serde(default)]
    pub upper_limit: Option<u64>,
}

/// Species are named as in [`ReactionNetwork::add_reaction_by_name`], or as
/// `scope/name` to reach into another scope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReactionDescription {
    #[serde(default)]
    pub reactants: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    pub rate: f64,
    #[serde(default)]
    pub kind: ReactionKind,
    #[serde(default)]
    pub passivated: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScopeDescription {
    pub name: String,
    /// Defaults to the root scope.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub species: Vec<SpeciesDescription>,
    #[serde(default)]
    pub reactions: Vec<ReactionDescription>,
}

/// Declarative form of a [`ReactionNetwork`]. A scope named like the root
/// describes the root itself; every other scope must name an earlier scope
/// (or the root) as its parent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NetworkDescription {
    #[serde(default = "default_root")]
    pub root: String,
    pub scopes: Vec<ScopeDescription>,
}

impl NetworkDescription {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Builds the network through the regular construction API, so names
    /// must be unique within a scope.
    pub fn build(&self) -> Result<ReactionNetwork> {
        let mut network = ReactionNetwork::new(&self.root);
        let mut scopes: HashMap<&str, NodeId> = HashMap::new();
        scopes.insert(&self.root, network.root());

        let mut placed = Vec::with_capacity(self.scopes.len());
        for scope in self.scopes.iter() {
            let id = if scope.name == self.root {
                network.root()
            } else {
                if scopes.contains_key(scope.name.as_str()) {
                    return Err(ChemError::DuplicateEntity(format!("scope {}", scope.name)));
                }
                let parent = match scope.parent.as_deref() {
                    Some(parent) => *scopes
                        .get(parent)
                        .ok_or_else(|| ChemError::Config(format!("unknown parent scope {parent}")))?,
                    None => network.root(),
                };
                network.add_scope(parent, &scope.name)?
            };
            scopes.insert(&scope.name, id);
            for species in scope.species.iter() {
                network.add_species_unique(
                    id,
                    &species.name,
                    species.copy_number,
                    species.upper_limit.unwrap_or(NO_UPPER_LIMIT),
                )?;
            }
            placed.push(id);
        }

        for (scope, &id) in self.scopes.iter().zip(placed.iter()) {
            for reaction in scope.reactions.iter() {
                let resolve = |name: &String| resolve_name(&network, &scopes, id, name);
                let reactants = reaction.reactants.iter().map(resolve).collect::<Result<Vec<_>>>()?;
                let products = reaction.products.iter().map(resolve).collect::<Result<Vec<_>>>()?;
                let added =
                    network.add_reaction_of_kind(id, reaction.kind, &reactants, &products, reaction.rate)?;
                if reaction.passivated {
                    network.passivate_reaction(added)?;
                }
            }
        }
        debug!(
            scopes = network.scopes().len(),
            species = network.number_of_species(),
            reactions = network.number_of_reactions(),
            "built network"
        );
        Ok(network)
    }
}

fn resolve_name(
    network: &ReactionNetwork,
    scopes: &HashMap<&str, NodeId>,
    scope: NodeId,
    name: &str,
) -> Result<SpeciesId> {
    match name.split_once('/') {
        Some((scope_name, species)) => {
            let scope = scopes
                .get(scope_name)
                .ok_or_else(|| ChemError::Config(format!("unknown scope {scope_name}")))?;
            network
                .find_species(*scope, species)
                .ok_or_else(|| ChemError::UnknownSpecies(name.to_string()))
        }
        None => network.resolve_species(scope, name),
    }
}

/// Everything the binary needs for a batch of runs.
#[derive(Serialize, Deserialize, Debug)]
pub struct SimulationConfig {
    #[serde(default)]
    pub scheduler: SchedulerKind,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default)]
    pub record_trajectory: bool,
    #[serde(default)]
    pub ending_criteria: Vec<Box<dyn EndingCriterion>>,
    pub network: NetworkDescription,
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(ChemError::Config("trials must be at least 1".to_string()));
        }
        if self.ending_criteria.is_empty() {
            return Err(ChemError::Config(
                "at least one ending criterion is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Seed of the given trial. Trials are independent but reproducible.
    pub fn trial_seed(&self, trial: usize) -> u64 {
        self.seed.wrapping_add(trial as u64)
    }
}
