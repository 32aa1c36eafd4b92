use crate::config::cli::{CliOpt, Command};
use crate::config::{load_scenario, simulation_time};
use anyhow::Context;
use clap::Parser;
use fastrand::Rng;
use tracing_subscriber::EnvFilter;

mod animation;
mod config;
mod scenario;
mod simulation;
mod util;

fn main() -> anyhow::Result<()> {
    let options = CliOpt::parse();

    // Logs go to stderr, so the report on stdout stays reproducible
    let default_level = if options.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "warn,sim_network={default_level},wan_workbench={default_level}"
            ))
        }))
        .with_writer(std::io::stderr)
        .init();

    let seed = if options.non_deterministic {
        Rng::new().u64(..)
    } else {
        options.seed
    };

    let scenario = match &options.command {
        Command::CommunityCloud(opt) => scenario::community_cloud(opt, seed)?,
        Command::Scenario(opt) => {
            let duration = simulation_time(opt.time)?;
            let title = opt
                .file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scenario".to_string());

            load_scenario(&opt.file)?
                .into_scenario(title, duration)
                .context("invalid scenario")?
        }
    };

    simulation::run_and_report(&options, scenario, seed)
}
