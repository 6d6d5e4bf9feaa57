use super::*;
use crate::error::ChemError;
use crate::species::SpeciesId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    Above,
    Equal,
    Below,
}

impl ComparisonMode {
    fn compare<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            ComparisonMode::Above => left <= right,
            ComparisonMode::Below => right <= left,
            ComparisonMode::Equal => left == right,
        }
    }
}

/// Watches the total copy number of every species called `species`, in all
/// scopes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpeciesCount {
    pub species: String,
    pub threshold: u64,
    pub mode: ComparisonMode,
    #[serde(default)]
    count: u64,
    #[serde(skip)]
    tracked: Vec<SpeciesId>,
}

impl SpeciesCount {
    pub fn new(species: &str, threshold: u64, mode: ComparisonMode) -> Self {
        SpeciesCount {
            species: species.to_string(),
            threshold,
            mode,
            count: 0,
            tracked: Vec::new(),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn recount(&mut self, network: &ReactionNetwork) {
        self.count = self
            .tracked
            .iter()
            .filter_map(|&s| network.copy_number(s).ok())
            .sum();
    }
}

#[typetag::serde]
impl EndingCriterion for SpeciesCount {
    fn should_end(&self) -> bool {
        self.mode.compare(self.threshold, self.count)
    }

    fn initialize(&mut self, network: &ReactionNetwork, _time: f64) -> Result<()> {
        self.tracked = network
            .species_ids()
            .filter(|&s| network.species_name(s).is_ok_and(|name| name == self.species))
            .collect();
        if self.tracked.is_empty() {
            return Err(ChemError::UnknownSpecies(self.species.clone()));
        }
        self.recount(network);
        Ok(())
    }

    fn update(&mut self, network: &ReactionNetwork, _time: f64, _reaction: Option<ReactionId>) {
        self.recount(network);
    }
}
