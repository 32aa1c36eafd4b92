use crate::network::Topology;
use crate::network::delivery::{Hop, LossReason};
use crate::network::node::NodeId;
use crate::trace::stepper::SimulationStepper;
use crate::trace::step::{
    FlowEvent, GenericPacketEvent, PacketInTransit, PacketLost, PacketSent, SimulationStep,
    SimulationStepKind,
};
use crate::traffic::{FlowId, FlowKey, Packet};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;

/// Records everything that happens to flows and packets, for later replay and verification
///
/// Steps may be recorded ahead of time (e.g. the hops of a packet are known as soon as it is
/// sent), so [`SimulationStepTracer::steps`] always returns them ordered by time.
#[derive(Default)]
pub struct SimulationStepTracer {
    recorded_steps: Mutex<Vec<SimulationStep>>,
    already_warned_losses: Mutex<HashSet<LossReason>>,
}

impl SimulationStepTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> Vec<SimulationStep> {
        let mut steps = self.recorded_steps.lock().clone();

        // Stable, so steps recorded for the same instant keep their causal order
        steps.sort_by_key(|s| s.relative_time);
        steps
    }

    pub fn stepper(&self) -> SimulationStepper {
        SimulationStepper::new(self.steps())
    }

    /// Forgets steps that lie beyond the simulation horizon
    pub fn discard_after(&self, horizon: Duration) {
        self.recorded_steps
            .lock()
            .retain(|s| s.relative_time <= horizon);
    }

    fn record(&self, relative_time: Duration, kind: SimulationStepKind) {
        self.recorded_steps.lock().push(SimulationStep {
            relative_time,
            kind,
        });
    }

    pub fn track_flow_started(&self, now: Duration, flow_id: FlowId, flow: FlowKey) {
        self.record(
            now,
            SimulationStepKind::FlowStarted(FlowEvent { flow_id, flow }),
        );
    }

    pub fn track_flow_completed(&self, now: Duration, flow_id: FlowId, flow: FlowKey) {
        self.record(
            now,
            SimulationStepKind::FlowCompleted(FlowEvent { flow_id, flow }),
        );
    }

    pub fn track_packet_sent(&self, packet: &Packet) {
        self.record(
            packet.sent_at,
            SimulationStepKind::PacketSent(PacketSent {
                packet_id: packet.id,
                flow: packet.flow,
                sequence: packet.sequence,
                packet_size_bytes: packet.size_bytes,
            }),
        );
    }

    pub fn track_hop(&self, packet: &Packet, hop: &Hop) {
        self.record(
            hop.departure,
            SimulationStepKind::PacketInTransit(PacketInTransit {
                packet_id: packet.id,
                node_id: hop.from,
                link_id: hop.link,
            }),
        );
        self.record(
            hop.arrival,
            SimulationStepKind::PacketInNode(GenericPacketEvent {
                packet_id: packet.id,
                node_id: hop.to,
            }),
        );
    }

    pub fn track_packet_delivered(&self, now: Duration, packet: &Packet) {
        self.record(
            now,
            SimulationStepKind::PacketDelivered(GenericPacketEvent {
                packet_id: packet.id,
                node_id: packet.flow.destination,
            }),
        );
    }

    pub fn track_packet_lost(
        &self,
        at: Duration,
        packet: &Packet,
        node: NodeId,
        reason: LossReason,
        topology: &Topology,
    ) {
        self.record(
            at,
            SimulationStepKind::PacketLost(PacketLost {
                packet_id: packet.id,
                node_id: node,
                reason,
            }),
        );

        let first_loss = self.already_warned_losses.lock().insert(reason);
        let node_label = topology
            .node(node)
            .map(|n| n.label().to_string())
            .unwrap_or_else(|_| node.to_string());

        if first_loss {
            let cause = match reason {
                LossReason::NoRoute => "no route to the destination".to_string(),
                LossReason::LinkLoss(link_id) => {
                    let link_name = topology
                        .link(link_id)
                        .map(|l| l.name().to_string())
                        .unwrap_or_else(|| link_id.to_string());
                    format!("random loss on link `{link_name}`")
                }
            };

            tracing::warn!(
                "{:.2}s packet {} of flow {} lost at `{node_label}` due to {cause} (further losses with the same cause will be logged at debug level)",
                at.as_secs_f64(),
                packet.id,
                packet.flow,
            );
        } else {
            tracing::debug!(
                "{:.2}s packet {} of flow {} lost at `{node_label}` ({reason})",
                at.as_secs_f64(),
                packet.id,
                packet.flow,
            );
        }
    }
}
