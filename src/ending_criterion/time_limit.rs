use super::*;

/// Stops once the simulation clock reaches `end_time`. The schedulers are
/// told about the limit, so the clock stops exactly there.
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct TimeLimit {
    pub end_time: f64,
    #[serde(default)]
    time: f64,
}

impl TimeLimit {
    pub fn new(end_time: f64) -> Self {
        TimeLimit { end_time, time: 0. }
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

#[typetag::serde]
impl EndingCriterion for TimeLimit {
    fn should_end(&self) -> bool {
        self.time >= self.end_time
    }

    fn initialize(&mut self, _network: &ReactionNetwork, time: f64) -> Result<()> {
        self.time = time;
        Ok(())
    }

    fn update(&mut self, _network: &ReactionNetwork, time: f64, _reaction: Option<ReactionId>) {
        self.time = time;
    }

    fn time_limit(&self) -> Option<f64> {
        Some(self.end_time)
    }
}
