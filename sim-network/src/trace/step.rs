use crate::network::delivery::LossReason;
use crate::network::link::LinkId;
use crate::network::node::NodeId;
use crate::traffic::{FlowId, FlowKey, PacketId};
use serde::{Deserialize, Serialize};
use serde_with::{DurationNanoSeconds, serde_as};
use std::time::Duration;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationStep {
    #[serde_as(as = "DurationNanoSeconds")]
    #[serde(rename = "relative_time_ns")]
    pub relative_time: Duration,
    #[serde(flatten)]
    pub kind: SimulationStepKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum SimulationStepKind {
    /// The flow became active and will start sending
    FlowStarted(FlowEvent),
    /// The flow will not send any more packets
    FlowCompleted(FlowEvent),
    /// The packet was created by an application at its source node
    PacketSent(PacketSent),
    /// The packet is being transferred over a link
    PacketInTransit(PacketInTransit),
    /// The packet is in one of the network nodes
    PacketInNode(GenericPacketEvent),
    /// The packet has been delivered to the application at its destination
    PacketDelivered(GenericPacketEvent),
    /// The packet was lost and will never reach its destination
    PacketLost(PacketLost),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub flow_id: FlowId,
    pub flow: FlowKey,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacketSent {
    pub packet_id: PacketId,
    pub flow: FlowKey,
    pub sequence: u64,
    pub packet_size_bytes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericPacketEvent {
    pub packet_id: PacketId,
    pub node_id: NodeId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacketInTransit {
    pub packet_id: PacketId,
    pub node_id: NodeId,
    pub link_id: LinkId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacketLost {
    pub packet_id: PacketId,
    pub node_id: NodeId,
    pub reason: LossReason,
}
