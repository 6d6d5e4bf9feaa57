use proptest::prelude::*;
use stochastic_chem::*;

type SpeciesSpec = (u64, u64);
type ReactionSpec = (Vec<usize>, Vec<usize>, f64);

fn network_strategy() -> impl Strategy<Value = (Vec<SpeciesSpec>, Vec<ReactionSpec>)> {
    (1usize..5).prop_flat_map(|n| {
        let species = prop::collection::vec((0u64..20, 5u64..30), n);
        let reaction = (
            prop::collection::vec(0..n, 0..=3),
            prop::collection::vec(0..n, 0..=3),
            0.1f64..5.,
        );
        (species, prop::collection::vec(reaction, 1..8))
    })
}

fn build(species: &[SpeciesSpec], reactions: &[ReactionSpec]) -> (ReactionNetwork, Vec<SpeciesId>) {
    let mut network = ReactionNetwork::default();
    let root = network.root();
    let ids: Vec<SpeciesId> = species
        .iter()
        .enumerate()
        .map(|(i, &(copies, limit))| {
            network
                .add_species(root, &format!("S{i}"), copies.min(limit), limit)
                .unwrap()
        })
        .collect();
    for (reactants, products, rate) in reactions {
        if reactants.is_empty() && products.is_empty() {
            continue;
        }
        let reactants: Vec<SpeciesId> = reactants.iter().map(|&i| ids[i]).collect();
        let products: Vec<SpeciesId> = products.iter().map(|&i| ids[i]).collect();
        network.add_reaction(root, &reactants, &products, *rate).unwrap();
    }
    (network, ids)
}

fn check(simulation: &Simulation, species: &[SpeciesId]) -> std::result::Result<(), TestCaseError> {
    let network = simulation.network();
    for &s in species {
        if let Ok(n) = network.copy_number(s) {
            prop_assert!(n <= network.upper_limit(s).unwrap());
        }
    }
    prop_assert!(network.verify_propensities(1e-9).is_ok());
    prop_assert!(network.verify_dependencies().is_ok());
    prop_assert!(simulation.scheduler().verify(network).is_ok());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn invariants_hold_while_stepping(
        (species, reactions) in network_strategy(),
        seed in any::<u64>(),
        next_reaction in any::<bool>(),
    ) {
        let kind = if next_reaction { SchedulerKind::NextReaction } else { SchedulerKind::Direct };
        let (network, ids) = build(&species, &reactions);
        let mut simulation = Simulation::new(network, kind, seed);
        simulation.initialize().unwrap();
        for _ in 0..200 {
            match simulation.step().unwrap() {
                StepOutcome::Fired { .. } => check(&simulation, &ids)?,
                _ => break,
            }
        }
    }

    #[test]
    fn invariants_survive_mutations_between_steps(
        (species, reactions) in network_strategy(),
        seed in any::<u64>(),
        next_reaction in any::<bool>(),
        edits in prop::collection::vec((0u8..4, any::<prop::sample::Index>()), 1..12),
    ) {
        let kind = if next_reaction { SchedulerKind::NextReaction } else { SchedulerKind::Direct };
        let (network, ids) = build(&species, &reactions);
        let mut simulation = Simulation::new(network, kind, seed);
        simulation.initialize().unwrap();

        for (edit, index) in edits {
            simulation.run(RunLimit::Steps(10)).unwrap();
            check(&simulation, &ids)?;
            let network = simulation.network_mut();
            let live: Vec<ReactionId> = network.reaction_ids().collect();
            let s = ids[index.index(ids.len())];
            match edit {
                0 if !live.is_empty() => {
                    network.remove_reaction(live[index.index(live.len())]).unwrap();
                }
                1 if !live.is_empty() => {
                    let r = live[index.index(live.len())];
                    if network.is_passivated(r).unwrap() {
                        network.activate_reaction(r).unwrap();
                    } else {
                        network.passivate_reaction(r).unwrap();
                    }
                }
                2 => {
                    let headroom = network.upper_limit(s).unwrap() - network.copy_number(s).unwrap();
                    network.increase_copy_number(s, headroom.min(3)).unwrap();
                }
                _ => {
                    let root = network.root();
                    network.add_reaction(root, &[s], &[], 1.0).unwrap();
                }
            }
            prop_assert!(simulation.network().verify_propensities(1e-9).is_ok());
            prop_assert!(simulation.network().verify_dependencies().is_ok());
        }
        simulation.run(RunLimit::Steps(10)).unwrap();
        check(&simulation, &ids)?;
    }

    #[test]
    fn incremental_propensities_match_a_full_recompute(
        (species, reactions) in network_strategy(),
        seed in any::<u64>(),
    ) {
        let (network, _) = build(&species, &reactions);
        let mut simulation = Simulation::new(network, SchedulerKind::NextReaction, seed);
        simulation.initialize().unwrap();
        simulation.run(RunLimit::Steps(100)).unwrap();

        let network = simulation.network_mut();
        let cached: Vec<f64> = network
            .reaction_ids()
            .map(|r| network.propensity(r).unwrap())
            .collect();
        network.recompute_all_propensities();
        let fresh: Vec<f64> = network
            .reaction_ids()
            .map(|r| network.propensity(r).unwrap())
            .collect();
        for (a, b) in cached.iter().zip(fresh.iter()) {
            prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.));
        }
    }
}
