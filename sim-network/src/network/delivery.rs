use crate::network::Topology;
use crate::network::link::LinkId;
use crate::network::node::NodeId;
use crate::traffic::Packet;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Decides the fate of a packet travelling along a resolved path
pub trait DeliveryModel {
    /// Computes when the packet reaches the last node in `path`, or where it gets lost
    ///
    /// An empty path means the destination could not be resolved.
    fn deliver_or_drop(
        &mut self,
        topology: &Topology,
        packet: &Packet,
        path: &[NodeId],
    ) -> DeliveryOutcome;
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryOutcome {
    Delivered {
        arrival: Duration,
        hops: Vec<Hop>,
    },
    Lost {
        node: NodeId,
        reason: LossReason,
        /// Hops completed before the packet was lost
        hops: Vec<Hop>,
    },
}

/// A packet's transfer between two adjacent nodes
#[derive(Clone, Debug, PartialEq)]
pub struct Hop {
    pub from: NodeId,
    pub to: NodeId,
    pub link: LinkId,
    pub departure: Duration,
    pub arrival: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LossReason {
    NoRoute,
    LinkLoss(LinkId),
}

impl Display for LossReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LossReason::NoRoute => f.write_str("no route to destination"),
            LossReason::LinkLoss(link) => write!(f, "lost on link {link}"),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransmissionModel {
    /// Only the propagation delay of each link is accounted for
    #[default]
    PropagationOnly,
    /// Each hop also takes the time needed to serialize the packet at the link's rate
    StoreAndForward,
}

/// Delivers packets over the links of the topology, dropping them at random according to each
/// link's packet loss ratio
pub struct LinkDelivery {
    rng: Rng,
    transmission: TransmissionModel,
}

impl LinkDelivery {
    pub fn new(rng: Rng, transmission: TransmissionModel) -> Self {
        Self { rng, transmission }
    }
}

impl DeliveryModel for LinkDelivery {
    fn deliver_or_drop(
        &mut self,
        topology: &Topology,
        packet: &Packet,
        path: &[NodeId],
    ) -> DeliveryOutcome {
        let mut hops = Vec::with_capacity(path.len().saturating_sub(1));
        let mut time = packet.sent_at;

        if path.is_empty() {
            return DeliveryOutcome::Lost {
                node: packet.flow.source,
                reason: LossReason::NoRoute,
                hops,
            };
        }

        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let Some(link) = topology.link_between(from, to) else {
                return DeliveryOutcome::Lost {
                    node: from,
                    reason: LossReason::NoRoute,
                    hops,
                };
            };

            // Links without loss never consume randomness, so lossless runs stay aligned
            if link.packet_loss_ratio() > 0.0 && self.rng.f64() < link.packet_loss_ratio() {
                return DeliveryOutcome::Lost {
                    node: from,
                    reason: LossReason::LinkLoss(link.id()),
                    hops,
                };
            }

            let departure = time;
            let mut arrival = departure + link.delay();
            if self.transmission == TransmissionModel::StoreAndForward {
                arrival += link.transmission_time(packet.size_bytes);
            }

            hops.push(Hop {
                from,
                to,
                link: link.id(),
                departure,
                arrival,
            });
            time = arrival;
        }

        DeliveryOutcome::Delivered {
            arrival: time,
            hops,
        }
    }
}
