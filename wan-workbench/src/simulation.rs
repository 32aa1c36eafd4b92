use crate::animation::AnimationExporter;
use crate::config::cli::CliOpt;
use crate::scenario::Scenario;
use crate::util::{
    SEPARATOR, print_banner, print_flow_stats, print_node_stats, print_parameter,
};
use anyhow::Context;
use sim_network::SimulationConfig;
use sim_network::trace::verifier::SimulationVerifier;
use std::fs;
use std::time::Duration;

pub fn run_and_report(options: &CliOpt, scenario: Scenario, seed: u64) -> anyhow::Result<()> {
    print_banner(&scenario.title);
    println!("Configuration:");
    for (label, value) in &scenario.parameters {
        print_parameter(label, value);
    }
    let duration = scenario.duration;
    print_parameter(
        "Simulation Time",
        format!("{} seconds", duration.as_secs_f64()),
    );
    print_parameter("Seed", seed);
    println!("{SEPARATOR}");

    let config = SimulationConfig {
        seed,
        ..SimulationConfig::default()
    };
    let mut simulation = scenario
        .into_simulation(config)
        .context("invalid scenario")?;

    println!();
    println!("Starting simulation...");
    println!();
    simulation.run(duration).context("simulation failed")?;

    print_banner("SIMULATION RESULTS");
    print!("{}", simulation.summary());
    print_flow_stats(simulation.stats(), simulation.topology());

    let steps = simulation.tracer().steps();
    let verified_simulation = SimulationVerifier::new(steps.clone(), simulation.topology())
        .verify()
        .context("failed to verify simulation")?;
    print_node_stats(&verified_simulation, simulation.topology());

    let replay_log_path = &options.replay_log;
    let json_steps = serde_json::to_vec_pretty(&steps).context("failed to serialize replay log")?;
    fs::write(replay_log_path, json_steps).context("failed to store replay log")?;

    let mut generated = vec![("Replay log", replay_log_path.display().to_string())];

    if let Some(animation_path) = &options.animation {
        let mut exporter = AnimationExporter::new();
        let samples = simulation
            .export_visualization(
                &mut exporter,
                Duration::from_millis(options.position_sample_ms),
                duration,
            )
            .context("failed to export animation")?;
        exporter.save(animation_path)?;
        tracing::info!("exported {samples} position samples");

        generated.push(("Animation", animation_path.display().to_string()));
    }

    println!("{SEPARATOR}");
    println!("Files Generated:");
    for (label, path) in generated {
        print_parameter(label, path);
    }
    println!("{SEPARATOR}");

    Ok(())
}
