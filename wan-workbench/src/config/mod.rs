use crate::config::scenario::ScenarioJson;
use anyhow::Context;
use sim_network::SimulationError;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub mod cli;
pub mod scenario;

pub fn load_scenario(path: &Path) -> anyhow::Result<ScenarioJson> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file at `{}`", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("invalid JSON in scenario file `{}`", path.display()))
}

/// The duration of a run, which must be finite and strictly positive
pub fn simulation_time(secs: f64) -> Result<Duration, SimulationError> {
    let invalid = || {
        SimulationError::Configuration(format!(
            "simulation time must be a positive number of seconds (got {secs})"
        ))
    };
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }

    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// A point in virtual time, which must be finite and non-negative
pub fn time_from_secs(secs: f64, what: &str) -> Result<Duration, SimulationError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        SimulationError::Configuration(format!("invalid {what}: {secs} s"))
    })
}
