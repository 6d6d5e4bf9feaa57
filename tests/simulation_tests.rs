use stochastic_chem::analysis::{firing_counts, time_averaged_copy_numbers};
use stochastic_chem::ending_criterion::{ComparisonMode, EndingCriterion, ReactionCount, SpeciesCount};
use stochastic_chem::simulate::simulate;
use stochastic_chem::*;

const SCHEDULERS: [SchedulerKind; 2] = [SchedulerKind::Direct, SchedulerKind::NextReaction];

fn isomerization(total: u64, forward: f64, backward: f64) -> (ReactionNetwork, SpeciesId) {
    let mut network = ReactionNetwork::default();
    let root = network.root();
    let a = network.add_species(root, "A", total, NO_UPPER_LIMIT).unwrap();
    let b = network.add_species(root, "B", 0, NO_UPPER_LIMIT).unwrap();
    network.add_reaction(root, &[a], &[b], forward).unwrap();
    network.add_reaction(root, &[b], &[a], backward).unwrap();
    (network, a)
}

#[test]
fn single_decay_step() {
    for kind in SCHEDULERS {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 10, NO_UPPER_LIMIT).unwrap();
        let b = network.add_species(root, "B", 0, NO_UPPER_LIMIT).unwrap();
        let r = network.add_reaction(root, &[a], &[b], 2.0).unwrap();

        let mut simulation = Simulation::new(network, kind, 42);
        simulation.initialize().unwrap();
        assert_eq!(simulation.network().propensity(r).unwrap(), 20.);
        let outcome = simulation.step().unwrap();
        assert!(matches!(outcome, StepOutcome::Fired { reaction, .. } if reaction == r));

        let network = simulation.network();
        assert_eq!(network.copy_number(a).unwrap(), 9);
        assert_eq!(network.copy_number(b).unwrap(), 1);
        assert_eq!(network.propensity(r).unwrap(), 18.);
    }
}

#[test]
fn dimerization_propensity() {
    let k = 0.25;
    let mut network = ReactionNetwork::default();
    let root = network.root();
    let a = network.add_species(root, "A", 3, NO_UPPER_LIMIT).unwrap();
    let b = network.add_species(root, "B", 0, NO_UPPER_LIMIT).unwrap();
    let r = network.add_reaction(root, &[a, a], &[b], k).unwrap();
    assert_eq!(network.propensity(r).unwrap(), 6. * k);

    network.fire(r).unwrap();
    assert_eq!(network.copy_number(a).unwrap(), 1);
    assert_eq!(network.propensity(r).unwrap(), 0.);
}

#[test]
fn isomerization_time_average() {
    for kind in SCHEDULERS {
        let (network, a) = isomerization(40, 1., 3.);
        let mut simulation = Simulation::new(network, kind, 2024);
        simulation.record_trajectory(true);
        simulation.initialize().unwrap();
        let initial = simulation.network().copy_numbers();
        let stoichiometry = simulation.network().stoichiometry();

        // Burn in, then average.
        simulation.run(RunLimit::Steps(2000)).unwrap();
        let start = simulation.time();
        let burned_in = simulation.trajectory().unwrap().len();
        assert_eq!(simulation.run(RunLimit::Steps(20000)).unwrap(), RunStatus::Continued);

        let trajectory = simulation.trajectory().unwrap();
        let mut state = initial.clone();
        for &(_, reaction) in &trajectory[..burned_in] {
            let column = stoichiometry.reactions.binary_search(&reaction).unwrap();
            for (n, delta) in state.iter_mut().zip(stoichiometry.matrix.column(column)) {
                *n = (*n as i64 + delta) as u64;
            }
        }
        let average = time_averaged_copy_numbers(
            &state,
            &stoichiometry,
            &trajectory[burned_in..],
            start,
            simulation.time(),
        )
        .unwrap();
        let mean_a = average[a.index()];
        assert!((mean_a - 30.).abs() < 1., "{kind:?}: mean A = {mean_a}");
    }
}

#[test]
fn constant_source_waiting_times() {
    for kind in SCHEDULERS {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let x = network.add_species(root, "X", 0, NO_UPPER_LIMIT).unwrap();
        network.add_reaction(root, &[], &[x], 2.0).unwrap();

        let mut criteria: Vec<Box<dyn EndingCriterion>> = vec![Box::new(ReactionCount::new(20000))];
        let (network, trajectory) = simulate(network, kind, &mut criteria, 99).unwrap();
        assert_eq!(network.copy_number(x).unwrap(), 20000);

        let mean_dt = trajectory.last().unwrap().0 / trajectory.len() as f64;
        assert!((mean_dt - 0.5).abs() < 0.02, "{kind:?}: mean dt = {mean_dt}");
    }
}

#[test]
fn competing_sources_split_by_rate() {
    for kind in SCHEDULERS {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let x = network.add_species(root, "X", 0, NO_UPPER_LIMIT).unwrap();
        let y = network.add_species(root, "Y", 0, NO_UPPER_LIMIT).unwrap();
        network.add_reaction(root, &[], &[x], 1.0).unwrap();
        network.add_reaction(root, &[], &[y], 3.0).unwrap();
        let stoichiometry = network.stoichiometry();

        let mut criteria: Vec<Box<dyn EndingCriterion>> = vec![Box::new(ReactionCount::new(20000))];
        let (_, trajectory) = simulate(network, kind, &mut criteria, 5).unwrap();
        let counts = firing_counts(&stoichiometry, &trajectory).unwrap();
        let fraction = counts[0] as f64 / trajectory.len() as f64;
        assert!((fraction - 0.25).abs() < 0.02, "{kind:?}: fraction = {fraction}");
    }
}

#[test]
fn upper_limits_hold_during_a_run() {
    for kind in SCHEDULERS {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 0, 7).unwrap();
        let b = network.add_species(root, "B", 0, 3).unwrap();
        network.add_reaction(root, &[], &[a], 10.0).unwrap();
        network.add_reaction(root, &[a], &[b], 1.0).unwrap();
        network.add_reaction(root, &[b], &[], 0.1).unwrap();

        let mut simulation = Simulation::new(network, kind, 17);
        simulation.initialize().unwrap();
        for _ in 0..2000 {
            simulation.step().unwrap();
            let network = simulation.network();
            assert!(network.copy_number(a).unwrap() <= 7);
            assert!(network.copy_number(b).unwrap() <= 3);
        }
    }
}

#[test]
fn reactions_added_mid_run_are_scheduled() {
    for kind in SCHEDULERS {
        let (network, a) = isomerization(10, 1., 1.);
        let mut simulation = Simulation::new(network, kind, 8);
        simulation.record_trajectory(true);
        simulation.initialize().unwrap();
        simulation.run(RunLimit::Steps(10)).unwrap();

        let root = simulation.network().root();
        let sink = simulation
            .network_mut()
            .add_reaction(root, &[a], &[], 100.0)
            .unwrap();
        simulation.run(RunLimit::Steps(50)).unwrap();
        assert!(simulation
            .trajectory()
            .unwrap()
            .iter()
            .any(|&(_, reaction)| reaction == sink));

        simulation.network_mut().passivate_reaction(sink).unwrap();
        let before = simulation.trajectory().unwrap().len();
        simulation.run(RunLimit::Steps(50)).unwrap();
        assert!(simulation.trajectory().unwrap()[before..]
            .iter()
            .all(|&(_, reaction)| reaction != sink));
        simulation.scheduler().verify(simulation.network()).unwrap();
    }
}

#[test]
fn species_count_criterion_ends_a_decay() {
    for kind in SCHEDULERS {
        let mut network = ReactionNetwork::default();
        let root = network.root();
        let a = network.add_species(root, "A", 100, NO_UPPER_LIMIT).unwrap();
        network.add_reaction(root, &[a], &[], 1.0).unwrap();

        let mut criteria: Vec<Box<dyn EndingCriterion>> =
            vec![Box::new(SpeciesCount::new("A", 40, ComparisonMode::Below))];
        let (network, trajectory) = simulate(network, kind, &mut criteria, 3).unwrap();
        assert_eq!(network.copy_number(a).unwrap(), 40);
        assert_eq!(trajectory.len(), 60);
        assert_eq!(
            criteria[0].downcast_ref::<SpeciesCount>().unwrap().count(),
            40
        );
    }
}
