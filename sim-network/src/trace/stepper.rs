use crate::network::node::NodeId;
use crate::trace::step::{SimulationStep, SimulationStepKind};
use crate::traffic::PacketId;
use std::time::Duration;

/// Read-only queries over a recorded trace
#[derive(Clone, Default)]
pub struct SimulationStepper {
    steps: Vec<SimulationStep>,
}

impl SimulationStepper {
    pub fn new(steps: Vec<SimulationStep>) -> Self {
        Self { steps }
    }

    pub fn record(&mut self, step: SimulationStep) {
        self.steps.push(step);
    }

    pub fn steps(self) -> Vec<SimulationStep> {
        self.steps
    }

    /// Every node the packet was seen at, starting with its source
    pub fn get_packet_hops(&self, id: PacketId) -> Vec<(Duration, NodeId)> {
        let mut hops = Vec::new();
        for step in &self.steps {
            match &step.kind {
                SimulationStepKind::PacketSent(s) if s.packet_id == id => {
                    hops.push((step.relative_time, s.flow.source));
                }
                SimulationStepKind::PacketInNode(s) if s.packet_id == id => {
                    hops.push((step.relative_time, s.node_id));
                }
                _ => {}
            }
        }

        hops
    }

    pub fn get_packet_path(&self, id: PacketId) -> Vec<NodeId> {
        self.get_packet_hops(id)
            .into_iter()
            .map(|(_, node_id)| node_id)
            .collect()
    }

    pub fn get_packet_arrived_at(&self, packet_id: PacketId, node_id: NodeId) -> Option<Duration> {
        self.get_packet_hops(packet_id)
            .into_iter()
            .find(|&(_, node)| node == node_id)
            .map(|(time, _)| time)
    }

    pub fn get_packet_delivered_at(&self, packet_id: PacketId) -> Option<Duration> {
        self.steps.iter().find_map(|s| match &s.kind {
            SimulationStepKind::PacketDelivered(kind) if kind.packet_id == packet_id => {
                Some(s.relative_time)
            }
            _ => None,
        })
    }

    /// Ids of all packets sent during the simulation, in order of creation
    pub fn sent_packets(&self) -> Vec<PacketId> {
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                SimulationStepKind::PacketSent(kind) => Some(kind.packet_id),
                _ => None,
            })
            .collect()
    }
}
