use super::*;

#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct ReactionCount {
    pub threshold: usize,
    #[serde(default)]
    count: usize,
}

impl ReactionCount {
    pub fn new(threshold: usize) -> Self {
        ReactionCount {
            threshold,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[typetag::serde]
impl EndingCriterion for ReactionCount {
    fn should_end(&self) -> bool {
        self.count >= self.threshold
    }

    fn initialize(&mut self, _network: &ReactionNetwork, _time: f64) -> Result<()> {
        self.count = 0;
        Ok(())
    }

    fn update(&mut self, _network: &ReactionNetwork, _time: f64, reaction: Option<ReactionId>) {
        if reaction.is_some() {
            self.count += 1;
        }
    }
}
