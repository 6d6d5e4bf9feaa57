use crate::error::Result;
use crate::network::ReactionNetwork;
use crate::reaction::ReactionId;
use downcast_rs::{impl_downcast, Downcast};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Decides when [`crate::simulate::Simulation::run_until`] stops. Criteria
/// are checked between steps only.
///
/// Criteria are serialized as tagged objects, e.g.
/// `{"type": "ReactionCount", "threshold": 100}`, and can be downcast back to
/// their concrete type to read what they counted.
#[typetag::serde(tag = "type")]
pub trait EndingCriterion: Downcast + Debug {
    fn should_end(&self) -> bool;
    fn initialize(&mut self, network: &ReactionNetwork, time: f64) -> Result<()>;
    /// Called after every step. `reaction` is `None` when the step did not
    /// fire anything.
    fn update(&mut self, network: &ReactionNetwork, time: f64, reaction: Option<ReactionId>);
    /// Absolute time past which the simulation must not advance.
    fn time_limit(&self) -> Option<f64> {
        None
    }
}
impl_downcast!(EndingCriterion);

mod reaction_count;
pub use reaction_count::*;

mod time_limit;
pub use time_limit::*;

mod species_count;
pub use species_count::*;

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn criteria_round_trip_through_json() {
        let json = r#"[
            {"type": "ReactionCount", "threshold": 10},
            {"type": "TimeLimit", "end_time": 2.5},
            {"type": "SpeciesCount", "species": "A", "threshold": 3, "mode": "Below"}
        ]"#;
        let criteria: Vec<Box<dyn EndingCriterion>> = serde_json::from_str(json).unwrap();
        assert_eq!(criteria.len(), 3);
        assert_eq!(
            criteria[0].downcast_ref::<ReactionCount>().unwrap().threshold,
            10
        );
        assert_eq!(criteria[1].time_limit(), Some(2.5));
        assert!(criteria[2].downcast_ref::<SpeciesCount>().is_some());

        let back = serde_json::to_string(&criteria[0]).unwrap();
        assert!(back.contains("\"type\":\"ReactionCount\""));
    }
}
