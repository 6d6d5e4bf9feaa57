use super::*;

/*
 * Direct copy number manipulation. Each operation validates first, then
 * writes, then refreshes every reaction the species takes part in.
 */
impl ReactionNetwork {
    pub fn increase_copy_number(&mut self, id: SpeciesId, by: u64) -> Result<u64> {
        let rspecies = self.species_mut(id)?.rspecies_mut();
        let before = rspecies.copy_number();
        let copy_number = rspecies.increase_copy_number(id, by)?;
        self.after_copy_number_change(id, before, copy_number)?;
        Ok(copy_number)
    }

    pub fn decrease_copy_number(&mut self, id: SpeciesId, by: u64) -> Result<u64> {
        let rspecies = self.species_mut(id)?.rspecies_mut();
        let before = rspecies.copy_number();
        let copy_number = rspecies.decrease_copy_number(id, by)?;
        self.after_copy_number_change(id, before, copy_number)?;
        Ok(copy_number)
    }

    pub fn set_copy_number(&mut self, id: SpeciesId, copy_number: u64) -> Result<()> {
        let rspecies = self.species_mut(id)?.rspecies_mut();
        let before = rspecies.copy_number();
        rspecies.set_copy_number(id, copy_number)?;
        self.after_copy_number_change(id, before, copy_number)
    }

    /// Changes the bound on a species. The gate on every reaction producing
    /// it moves with the bound, so those propensities are refreshed too.
    pub fn set_upper_limit(&mut self, id: SpeciesId, upper_limit: u64) -> Result<()> {
        self.species_mut(id)?.rspecies_mut().set_upper_limit(id, upper_limit)?;
        let involved = self.species(id)?.rspecies().involved_in();
        for reaction in involved {
            self.refresh_propensity(reaction);
        }
        Ok(())
    }

    fn after_copy_number_change(&mut self, id: SpeciesId, before: u64, copy_number: u64) -> Result<()> {
        // Both ends are at most MAX_COPY_NUMBER, so the difference fits.
        let delta = (i128::from(copy_number) - i128::from(before)) as i64;
        let rspecies = self.species(id)?.rspecies();
        let signaling = rspecies.is_signaling();
        let involved = rspecies.involved_in();
        for reaction in involved {
            self.refresh_propensity(reaction);
        }
        if signaling && delta != 0 {
            self.queue_event(ChemEvent::CopyNumberChanged {
                species: id,
                delta,
                copy_number,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::error::InvariantViolation;
    use crate::species::{MAX_COPY_NUMBER, NO_UPPER_LIMIT};

    #[test]
    fn decreasing_an_empty_species_is_rejected() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 0, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(root, &[a], &[], 1.0).unwrap();
        network.take_changes();

        let err = network.decrease_copy_number(a, 1).unwrap_err();
        assert!(matches!(
            err,
            ChemError::Invariant(InvariantViolation::Underflow { copy_number: 0, by: 1, .. })
        ));
        assert_eq!(network.copy_number(a).unwrap(), 0);
        assert_eq!(network.propensity(r).unwrap(), 0.);
        assert!(network.take_changes().is_empty());
    }

    #[test]
    fn manual_changes_refresh_propensities() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 2, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(root, "B", 0, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(root, &[a, a], &[b], 1.0).unwrap();
        assert_eq!(network.propensity(r).unwrap(), 2.);
        network.take_changes();

        network.increase_copy_number(a, 1).unwrap();
        assert_eq!(network.propensity(r).unwrap(), 6.);
        assert_eq!(
            network.take_changes(),
            vec![NetworkChange::PropensityChanged(r)]
        );

        network.set_copy_number(a, 0).unwrap();
        assert_eq!(network.propensity(r).unwrap(), 0.);
    }

    #[test]
    fn upper_limit_gates_producers() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 5, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(root, "B", 2, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(root, &[a], &[b], 1.0).unwrap();
        assert_eq!(network.propensity(r).unwrap(), 5.);

        network.set_upper_limit(b, 2).unwrap();
        assert_eq!(network.propensity(r).unwrap(), 0.);
        assert!(network.set_upper_limit(b, 1).is_err());
        assert!(network.increase_copy_number(b, 1).is_err());

        network.set_upper_limit(b, 3).unwrap();
        assert_eq!(network.propensity(r).unwrap(), 5.);
    }

    #[test]
    fn signaling_species_report_manual_changes() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 2, NO_UPPER_LIMIT).unwrap();
        network.start_signaling_species(a).unwrap();
        network.decrease_copy_number(a, 2).unwrap();
        network.set_copy_number(a, 0).unwrap();
        assert_eq!(
            network.drain_events(),
            vec![ChemEvent::CopyNumberChanged {
                species: a,
                delta: -2,
                copy_number: 0
            }]
        );
    }

    #[test]
    fn huge_copy_numbers_stay_within_i64() {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 0, NO_UPPER_LIMIT).unwrap();
        network.start_signaling_species(a).unwrap();

        let err = network.set_copy_number(a, 1u64 << 63).unwrap_err();
        assert!(matches!(
            err,
            ChemError::Invariant(InvariantViolation::OverflowBound { upper_limit: MAX_COPY_NUMBER, .. })
        ));
        assert!(network.increase_copy_number(a, u64::MAX).is_err());
        assert_eq!(network.copy_number(a).unwrap(), 0);

        network.set_copy_number(a, MAX_COPY_NUMBER).unwrap();
        network.decrease_copy_number(a, MAX_COPY_NUMBER).unwrap();
        assert_eq!(
            network.drain_events(),
            vec![
                ChemEvent::CopyNumberChanged {
                    species: a,
                    delta: i64::MAX,
                    copy_number: MAX_COPY_NUMBER
                },
                ChemEvent::CopyNumberChanged {
                    species: a,
                    delta: -i64::MAX,
                    copy_number: 0
                },
            ]
        );
        assert!(network.add_species(root, "B", 1u64 << 63, NO_UPPER_LIMIT).is_err());
    }
}
