use crate::network::Topology;
use crate::network::link::LinkId;
use crate::network::node::NodeId;
use crate::trace::step::{PacketSent, SimulationStep, SimulationStepKind};
use crate::trace::stats::{NodeStats, PacketStats};
use crate::traffic::{FlowKey, PacketId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

pub struct VerifiedSimulation {
    pub stats_by_node: BTreeMap<NodeId, NodeStats>,
    /// Packets that were still travelling when the trace ended
    pub in_flight_at_end: u64,
}

#[derive(Error, Debug, PartialEq)]
pub enum InvalidSimulation {
    #[error("network node `{node_id}` was referenced but does not exist")]
    MissingNode { node_id: NodeId },
    #[error("network link `{link_id}` was referenced but does not exist")]
    MissingLink { link_id: LinkId },
    #[error("packet `{packet_id}` was sent more than once")]
    PacketAlreadySent { packet_id: PacketId },
    #[error("packet `{packet_id}` was referenced before being sent")]
    UnknownPacket { packet_id: PacketId },
    #[error("packet `{packet_id}` was expected at node `{node_id}`, but it was not there")]
    PacketNotInNode { packet_id: PacketId, node_id: NodeId },
    #[error("packet `{packet_id}` reached node `{node_id}` without travelling over a link to it")]
    InvalidPacketReceive { packet_id: PacketId, node_id: NodeId },
    #[error("network node `{node_id}` sent a packet through link `{link_id}`, which is not connected to it")]
    InvalidPacketSend { node_id: NodeId, link_id: LinkId },
    #[error(
        "packet `{packet_id}` crossed link `{link_id}` in {elapsed:?}, faster than its delay allows ({delay:?})"
    )]
    PacketTooEarly {
        packet_id: PacketId,
        link_id: LinkId,
        elapsed: Duration,
        delay: Duration,
    },
    #[error("packet `{packet_id}` was delivered at `{node_id}`, which is not its destination")]
    WrongDestination { packet_id: PacketId, node_id: NodeId },
    #[error("packet `{packet_id}` was delivered or lost more than once")]
    PacketAlreadyFinished { packet_id: PacketId },
    #[error("flow `{flow}` sent packet `{packet_id}` after completing")]
    SendAfterCompletion { flow: FlowKey, packet_id: PacketId },
}

/// Replays a recorded trace against the topology, checking that packets only ever move along
/// existing links, never faster than the links allow, and are delivered at most once
pub struct SimulationVerifier<'a> {
    steps: Vec<SimulationStep>,
    topology: &'a Topology,
    nodes: BTreeMap<NodeId, ReplayedNode>,
    packets: HashMap<PacketId, ReplayedPacket>,
    completed_flows: HashSet<FlowKey>,
}

impl<'a> SimulationVerifier<'a> {
    pub fn new(mut steps: Vec<SimulationStep>, topology: &'a Topology) -> Self {
        if !steps.is_sorted_by_key(|s| s.relative_time) {
            steps.sort_by_key(|s| s.relative_time);
        }

        let nodes = topology
            .nodes()
            .map(|n| (n.id(), ReplayedNode::default()))
            .collect();

        Self {
            steps,
            topology,
            nodes,
            packets: HashMap::new(),
            completed_flows: HashSet::new(),
        }
    }

    pub fn verify(mut self) -> Result<VerifiedSimulation, InvalidSimulation> {
        let steps = std::mem::take(&mut self.steps);
        let topology = self.topology;
        for step in steps {
            let now = step.relative_time;
            match &step.kind {
                SimulationStepKind::FlowStarted(_) => {}
                SimulationStepKind::FlowCompleted(s) => {
                    self.completed_flows.insert(s.flow);
                }
                SimulationStepKind::PacketSent(s) => self.packet_sent(s)?,
                SimulationStepKind::PacketInTransit(s) => {
                    let link = topology.link(s.link_id).ok_or(
                        InvalidSimulation::MissingLink {
                            link_id: s.link_id,
                        },
                    )?;
                    if link.other_end(s.node_id).is_none() {
                        return Err(InvalidSimulation::InvalidPacketSend {
                            node_id: s.node_id,
                            link_id: s.link_id,
                        });
                    }

                    let packet = self.packet_at_node(s.packet_id, s.node_id)?;
                    let forwarded = s.node_id != packet.source;
                    let size_bytes = packet.size_bytes;
                    packet.location = Location::OnLink {
                        link_id: s.link_id,
                        from: s.node_id,
                        departure: now,
                    };

                    if forwarded {
                        self.node(s.node_id)?.forwarded.track_one(size_bytes);
                    }
                }
                SimulationStepKind::PacketInNode(s) => {
                    let packet = self.packet(s.packet_id)?;
                    let Location::OnLink {
                        link_id,
                        from,
                        departure,
                    } = packet.location
                    else {
                        return Err(InvalidSimulation::InvalidPacketReceive {
                            packet_id: s.packet_id,
                            node_id: s.node_id,
                        });
                    };

                    let link = topology
                        .link(link_id)
                        .ok_or(InvalidSimulation::MissingLink { link_id })?;
                    if link.other_end(from) != Some(s.node_id) {
                        return Err(InvalidSimulation::InvalidPacketReceive {
                            packet_id: s.packet_id,
                            node_id: s.node_id,
                        });
                    }

                    let elapsed = now.saturating_sub(departure);
                    if elapsed < link.delay() {
                        return Err(InvalidSimulation::PacketTooEarly {
                            packet_id: s.packet_id,
                            link_id,
                            elapsed,
                            delay: link.delay(),
                        });
                    }

                    packet.location = Location::InNode(s.node_id);
                }
                SimulationStepKind::PacketDelivered(s) => {
                    let packet = self.packet_at_node(s.packet_id, s.node_id)?;
                    if packet.destination != s.node_id {
                        return Err(InvalidSimulation::WrongDestination {
                            packet_id: s.packet_id,
                            node_id: s.node_id,
                        });
                    }

                    packet.location = Location::Finished;
                    let size_bytes = packet.size_bytes;
                    self.node(s.node_id)?.received.track_one(size_bytes);
                }
                SimulationStepKind::PacketLost(s) => {
                    let packet = self.packet_at_node(s.packet_id, s.node_id)?;
                    packet.location = Location::Finished;
                    let size_bytes = packet.size_bytes;
                    self.node(s.node_id)?.lost.track_one(size_bytes);
                }
            }
        }

        let in_flight_at_end = self
            .packets
            .values()
            .filter(|p| p.location != Location::Finished)
            .count() as u64;

        let stats_by_node = self
            .nodes
            .into_iter()
            .map(|(id, node)| {
                (
                    id,
                    NodeStats {
                        sent: node.sent,
                        received: node.received,
                        forwarded: node.forwarded,
                        lost: node.lost,
                    },
                )
            })
            .collect();

        Ok(VerifiedSimulation {
            stats_by_node,
            in_flight_at_end,
        })
    }

    fn packet_sent(&mut self, s: &PacketSent) -> Result<(), InvalidSimulation> {
        if self.completed_flows.contains(&s.flow) {
            return Err(InvalidSimulation::SendAfterCompletion {
                flow: s.flow,
                packet_id: s.packet_id,
            });
        }

        if self.packets.contains_key(&s.packet_id) {
            return Err(InvalidSimulation::PacketAlreadySent {
                packet_id: s.packet_id,
            });
        }

        self.node(s.flow.destination)?;
        self.node(s.flow.source)?.sent.track_one(s.packet_size_bytes);
        self.packets.insert(
            s.packet_id,
            ReplayedPacket {
                source: s.flow.source,
                destination: s.flow.destination,
                size_bytes: s.packet_size_bytes,
                location: Location::InNode(s.flow.source),
            },
        );

        Ok(())
    }

    fn node(&mut self, node_id: NodeId) -> Result<&mut ReplayedNode, InvalidSimulation> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(InvalidSimulation::MissingNode { node_id })
    }

    fn packet(&mut self, packet_id: PacketId) -> Result<&mut ReplayedPacket, InvalidSimulation> {
        let packet = self
            .packets
            .get_mut(&packet_id)
            .ok_or(InvalidSimulation::UnknownPacket { packet_id })?;

        if packet.location == Location::Finished {
            return Err(InvalidSimulation::PacketAlreadyFinished { packet_id });
        }

        Ok(packet)
    }

    fn packet_at_node(
        &mut self,
        packet_id: PacketId,
        node_id: NodeId,
    ) -> Result<&mut ReplayedPacket, InvalidSimulation> {
        let packet = self.packet(packet_id)?;
        if packet.location != Location::InNode(node_id) {
            return Err(InvalidSimulation::PacketNotInNode { packet_id, node_id });
        }

        Ok(packet)
    }
}

#[derive(Default)]
struct ReplayedNode {
    sent: PacketStats,
    received: PacketStats,
    forwarded: PacketStats,
    lost: PacketStats,
}

struct ReplayedPacket {
    source: NodeId,
    destination: NodeId,
    size_bytes: u32,
    location: Location,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Location {
    InNode(NodeId),
    OnLink {
        link_id: LinkId,
        from: NodeId,
        departure: Duration,
    },
    Finished,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::delivery::LossReason;
    use crate::network::mobility::Mobility;
    use crate::network::node::{NodeRole, Position};
    use crate::trace::step::{GenericPacketEvent, PacketInTransit, PacketLost};

    fn topology() -> Topology {
        let mut topology = Topology::new();
        for label in ["client", "router", "server"] {
            topology
                .add_node(NodeRole::WanRouter, label, Position::default(), Mobility::Fixed)
                .unwrap();
        }
        topology
            .add_link(NodeId(0), NodeId(1), 1000, Duration::from_millis(5))
            .unwrap();
        topology
            .add_link(NodeId(1), NodeId(2), 1000, Duration::from_millis(5))
            .unwrap();
        topology
    }

    fn flow() -> FlowKey {
        FlowKey {
            source: NodeId(0),
            source_port: 49153,
            destination: NodeId(2),
            destination_port: 9,
        }
    }

    fn at(ms: u64, kind: SimulationStepKind) -> SimulationStep {
        SimulationStep {
            relative_time: Duration::from_millis(ms),
            kind,
        }
    }

    fn sent(id: u64) -> SimulationStepKind {
        SimulationStepKind::PacketSent(PacketSent {
            packet_id: PacketId(id),
            flow: flow(),
            sequence: id,
            packet_size_bytes: 100,
        })
    }

    fn transit(id: u64, node: u32, link: u32) -> SimulationStepKind {
        SimulationStepKind::PacketInTransit(PacketInTransit {
            packet_id: PacketId(id),
            node_id: NodeId(node),
            link_id: LinkId(link),
        })
    }

    fn in_node(id: u64, node: u32) -> SimulationStepKind {
        SimulationStepKind::PacketInNode(GenericPacketEvent {
            packet_id: PacketId(id),
            node_id: NodeId(node),
        })
    }

    fn delivered(id: u64, node: u32) -> SimulationStepKind {
        SimulationStepKind::PacketDelivered(GenericPacketEvent {
            packet_id: PacketId(id),
            node_id: NodeId(node),
        })
    }

    fn full_trip(id: u64, start_ms: u64) -> Vec<SimulationStep> {
        vec![
            at(start_ms, sent(id)),
            at(start_ms, transit(id, 0, 0)),
            at(start_ms + 5, in_node(id, 1)),
            at(start_ms + 5, transit(id, 1, 1)),
            at(start_ms + 10, in_node(id, 2)),
            at(start_ms + 10, delivered(id, 2)),
        ]
    }

    #[test]
    fn test_valid_trace() {
        let topology = topology();
        let mut steps = full_trip(0, 1000);
        steps.extend(full_trip(1, 1500));
        steps.push(at(2000, sent(2)));
        steps.push(at(
            2000,
            SimulationStepKind::PacketLost(PacketLost {
                packet_id: PacketId(2),
                node_id: NodeId(0),
                reason: LossReason::LinkLoss(LinkId(0)),
            }),
        ));
        steps.push(at(2500, sent(3)));
        steps.push(at(2500, transit(3, 0, 0)));

        let verified = SimulationVerifier::new(steps, &topology).verify().unwrap();

        let client = &verified.stats_by_node[&NodeId(0)];
        assert_eq!(client.sent.packets, 4);
        assert_eq!(client.lost.packets, 1);
        assert_eq!(verified.stats_by_node[&NodeId(1)].forwarded.packets, 2);
        assert_eq!(verified.stats_by_node[&NodeId(2)].received.bytes, 200);
        assert_eq!(verified.in_flight_at_end, 1);
    }

    #[test]
    fn test_packet_faster_than_link_is_rejected() {
        let topology = topology();
        let steps = vec![
            at(1000, sent(0)),
            at(1000, transit(0, 0, 0)),
            at(1004, in_node(0, 1)),
        ];

        let result = SimulationVerifier::new(steps, &topology).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::PacketTooEarly { .. })
        ));
    }

    #[test]
    fn test_packet_delivered_twice_is_rejected() {
        let topology = topology();
        let mut steps = full_trip(0, 1000);
        steps.push(at(1020, delivered(0, 2)));

        let result = SimulationVerifier::new(steps, &topology).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::PacketAlreadyFinished { .. })
        ));
    }

    #[test]
    fn test_packet_out_of_thin_air_is_rejected() {
        let topology = topology();
        let steps = vec![at(1000, in_node(7, 1))];

        let result = SimulationVerifier::new(steps, &topology).verify();
        assert_eq!(
            result.err(),
            Some(InvalidSimulation::UnknownPacket {
                packet_id: PacketId(7)
            })
        );
    }

    #[test]
    fn test_send_over_unconnected_link_is_rejected() {
        let topology = topology();
        let steps = vec![at(1000, sent(0)), at(1000, transit(0, 0, 1))];

        let result = SimulationVerifier::new(steps, &topology).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::InvalidPacketSend { .. })
        ));
    }

    #[test]
    fn test_send_after_completion_is_rejected() {
        let topology = topology();
        let steps = vec![
            at(
                1000,
                SimulationStepKind::FlowCompleted(crate::trace::step::FlowEvent {
                    flow_id: crate::traffic::FlowId(0),
                    flow: flow(),
                }),
            ),
            at(1500, sent(0)),
        ];

        let result = SimulationVerifier::new(steps, &topology).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::SendAfterCompletion { .. })
        ));
    }

    #[test]
    fn test_delivery_at_wrong_node_is_rejected() {
        let topology = topology();
        let steps = vec![
            at(1000, sent(0)),
            at(1000, transit(0, 0, 0)),
            at(1005, in_node(0, 1)),
            at(1005, delivered(0, 1)),
        ];

        let result = SimulationVerifier::new(steps, &topology).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::WrongDestination { .. })
        ));
    }
}
