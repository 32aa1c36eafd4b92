//! Observational hooks for external renderers
//!
//! Sinks are told about every node and sampled positions over time. Nothing they do can influence
//! the outcome of a simulation.

use crate::error::SimulationError;
use crate::network::Topology;
use crate::network::node::{Node, NodeId, NodeRole, Position, Rgb};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub id: NodeId,
    #[serde(with = "crate::util::serde_arc_str")]
    pub label: Arc<str>,
    pub role: NodeRole,
    pub color: Rgb,
    pub size: f64,
}

impl From<&Node> for NodeDescription {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id(),
            label: node.label().clone(),
            role: node.role(),
            color: node.role().color(),
            size: node.role().display_size(),
        }
    }
}

pub trait VisualizationSink {
    fn describe_node(&mut self, node: NodeDescription);
    fn update_position(&mut self, node: NodeId, time: Duration, position: Position);
}

pub struct NoOpVisualizationSink;

impl VisualizationSink for NoOpVisualizationSink {
    fn describe_node(&mut self, _: NodeDescription) {}
    fn update_position(&mut self, _: NodeId, _: Duration, _: Position) {}
}

/// Describes every node to the sink, then samples all positions every `sample_interval` until
/// `until` (inclusive)
///
/// Returns the number of position samples emitted.
pub fn export(
    topology: &Topology,
    sink: &mut dyn VisualizationSink,
    sample_interval: Duration,
    until: Duration,
) -> Result<u64, SimulationError> {
    if sample_interval.is_zero() {
        return Err(SimulationError::Configuration(
            "position sample interval must be positive".to_string(),
        ));
    }

    for node in topology.nodes() {
        sink.describe_node(node.into());
    }

    let mut samples = 0;
    let mut time = Duration::ZERO;
    while time <= until {
        for node in topology.nodes() {
            sink.update_position(node.id(), time, topology.position_at(node.id(), time)?);
            samples += 1;
        }

        time += sample_interval;
    }

    Ok(samples)
}
