use stochastic_chem::analysis;
use stochastic_chem::config::SimulationConfig;
use stochastic_chem::*;
use tqdm::tqdm;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO: &str = r#"{
    "scheduler": "NextReaction",
    "seed": 1,
    "trials": 20,
    "record_trajectory": true,
    "ending_criteria": [
        {"type": "TimeLimit", "end_time": 10.0},
        {"type": "SpeciesCount", "species": "C", "threshold": 100, "mode": "Above"}
    ],
    "network": {
        "root": "medium",
        "scopes": [
            {
                "name": "medium",
                "species": [{"name": "A", "copy_number": 200}]
            },
            {
                "name": "cell",
                "species": [
                    {"name": "A"},
                    {"name": "B", "copy_number": 50},
                    {"name": "C", "upper_limit": 150}
                ],
                "reactions": [
                    {"reactants": ["medium/A"], "products": ["A"], "rate": 0.5, "kind": "Diffusion"},
                    {"reactants": ["A"], "products": ["medium/A"], "rate": 0.5, "kind": "Diffusion"},
                    {"reactants": ["A", "B"], "products": ["C"], "rate": 0.01},
                    {"reactants": ["C"], "products": ["A", "B"], "rate": 0.1}
                ]
            }
        ]
    }
}"#;

fn main() -> std::result::Result<(), Box<dyn std::error::Error + 'static>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::from_json_str(DEMO)?,
    };
    info!(
        scheduler = ?config.scheduler,
        trials = config.trials,
        seed = config.seed,
        "starting"
    );

    let mut mean_final = None;
    for trial in tqdm(0..config.trials) {
        let network = config.network.build()?;
        let mut simulation = Simulation::new(network, config.scheduler, config.trial_seed(trial));
        simulation.record_trajectory(config.record_trajectory);
        simulation.initialize()?;
        let initial = simulation.network().copy_numbers();
        let stoichiometry = simulation.network().stoichiometry();

        let status = simulation.run_until(&mut config.ending_criteria)?;
        let time = simulation.time();
        if let Some(trajectory) = simulation.trajectory() {
            let average =
                analysis::time_averaged_copy_numbers(&initial, &stoichiometry, trajectory, 0., time)?;
            info!(trial, ?status, time, steps = simulation.steps(), ?average, "trial finished");
        }

        let last = simulation.network().copy_numbers().mapv(|n| n as f64);
        mean_final = Some(match mean_final {
            Some(sum) => sum + &last,
            None => last,
        });
    }

    if let Some(sum) = mean_final {
        let mean = sum / config.trials as f64;
        let network = config.network.build()?;
        for (species, n) in network.species_ids().zip(mean.iter()) {
            println!("{}\t{:.3}", network.species_name(species)?, n);
        }
    }
    Ok(())
}
