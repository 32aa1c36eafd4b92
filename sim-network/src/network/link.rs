use crate::network::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u32);

impl Display for LinkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// A bidirectional point-to-point link between two nodes
#[derive(Clone, Debug)]
pub struct NetworkLink {
    pub(crate) id: LinkId,
    pub(crate) name: Arc<str>,
    pub(crate) endpoints: (NodeId, NodeId),
    pub(crate) bandwidth_bps: u64,
    pub(crate) delay: Duration,
    pub(crate) packet_loss_ratio: f64,
}

impl NetworkLink {
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Human-readable name, in the form `<label a>-<label b>`
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The endpoints of the link, lowest id first
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        self.endpoints
    }

    pub fn bandwidth_bps(&self) -> u64 {
        self.bandwidth_bps
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn packet_loss_ratio(&self) -> f64 {
        self.packet_loss_ratio
    }

    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        self.endpoints == ordered(a, b)
    }

    /// Returns the node at the other end of the link, if `node` is one of its endpoints
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        match self.endpoints {
            (a, b) if a == node => Some(b),
            (a, b) if b == node => Some(a),
            _ => None,
        }
    }

    /// The time it takes to put a packet of the provided size on the wire
    pub fn transmission_time(&self, packet_size_bytes: u32) -> Duration {
        let packet_size_bits = packet_size_bytes as u128 * 8;
        let nanos = packet_size_bits * 1_000_000_000 / self.bandwidth_bps as u128;
        Duration::from_nanos(nanos as u64)
    }
}

pub(crate) fn ordered(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Optional link parameters, besides the mandatory rate and delay
#[derive(Clone, Debug, Default)]
pub struct LinkOptions {
    pub packet_loss_ratio: f64,
}
