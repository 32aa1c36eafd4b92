//! Replay trace of a simulation run
//!
//! The tracer records every flow and packet event; the stepper answers queries about the recorded
//! steps, and the verifier replays them against the topology to make sure the run was sound.

pub mod stats;
pub mod step;
pub mod stepper;
pub mod tracer;
pub mod verifier;
