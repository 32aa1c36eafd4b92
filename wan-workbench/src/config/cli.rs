use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// The random seed used for the simulation (governing packet loss and the movement of mobile
    /// nodes)
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Whether the run should be non-deterministic, i.e. using a non-constant seed for the random
    /// number generators
    #[arg(long)]
    pub non_deterministic: bool,

    /// Whether to log simulation milestones to stderr
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub verbose: bool,

    /// Path where the replay log will be stored
    #[arg(long, default_value = "replay-log.json")]
    pub replay_log: PathBuf,

    /// Path where the node descriptions and their positions over time will be stored, as JSON
    #[arg(long)]
    pub animation: Option<PathBuf>,

    /// The interval at which node positions are sampled for the animation
    #[arg(long, default_value_t = 1000)]
    pub position_sample_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the built-in community cloud WAN scenario
    CommunityCloud(CommunityCloudOpt),
    /// Run a scenario described in a JSON file
    Scenario(ScenarioOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct CommunityCloudOpt {
    /// The number of traffic sensors, attached to the second WAN router
    #[arg(long, default_value_t = 8)]
    pub sensors: u32,

    /// The number of government offices, attached to the third WAN router
    #[arg(long, default_value_t = 3)]
    pub offices: u32,

    /// The number of citizens, roaming around the wireless access point
    #[arg(long, default_value_t = 10)]
    pub citizens: u32,

    /// The duration of the run, in seconds
    #[arg(long, default_value_t = 30.0)]
    pub time: f64,
}

#[derive(Parser, Debug, Clone)]
pub struct ScenarioOpt {
    /// Path to the JSON file containing the scenario
    #[arg(long)]
    pub file: PathBuf,

    /// The duration of the run, in seconds
    #[arg(long, default_value_t = 30.0)]
    pub time: f64,
}
