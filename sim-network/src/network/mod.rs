//! Static network topology
//!
//! Nodes and links are registered before the simulation starts and never change afterwards. The
//! only time-dependent property of the topology is the position of mobile nodes, which is derived
//! on demand from their mobility model.

pub mod delivery;
pub mod link;
pub mod mobility;
pub mod node;
pub mod routing;

use crate::error::SimulationError;
use crate::network::link::{LinkId, LinkOptions, NetworkLink, ordered};
use crate::network::mobility::Mobility;
use crate::network::node::{Node, NodeId, NodeRole, Position};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, Node>,
    links: Vec<NetworkLink>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, assigning it the lowest identifier that is still free
    pub fn add_node(
        &mut self,
        role: NodeRole,
        label: impl Into<Arc<str>>,
        initial_position: Position,
        mobility: Mobility,
    ) -> Result<NodeId, SimulationError> {
        let mut id = NodeId(0);
        while self.nodes.contains_key(&id) {
            id = NodeId(id.0 + 1);
        }

        self.add_node_with_id(id, role, label, initial_position, mobility)
    }

    pub fn add_node_with_id(
        &mut self,
        id: NodeId,
        role: NodeRole,
        label: impl Into<Arc<str>>,
        initial_position: Position,
        mobility: Mobility,
    ) -> Result<NodeId, SimulationError> {
        if self.nodes.contains_key(&id) {
            return Err(SimulationError::Duplicate(format!("node id `{id}`")));
        }

        if !initial_position.x.is_finite() || !initial_position.y.is_finite() {
            return Err(SimulationError::Configuration(format!(
                "node `{id}` has a non-finite initial position"
            )));
        }

        mobility.validate()?;

        let label = label.into();
        tracing::debug!("adding {role} node `{label}` as {id}");

        self.nodes.insert(
            id,
            Node {
                id,
                label,
                role,
                initial_position,
                mobility,
            },
        );
        self.adjacency.insert(id, BTreeSet::new());

        Ok(id)
    }

    /// Connects two existing nodes through a lossless link
    pub fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        bandwidth_bps: u64,
        delay: Duration,
    ) -> Result<LinkId, SimulationError> {
        self.add_link_with_options(a, b, bandwidth_bps, delay, LinkOptions::default())
    }

    pub fn add_link_with_options(
        &mut self,
        a: NodeId,
        b: NodeId,
        bandwidth_bps: u64,
        delay: Duration,
        options: LinkOptions,
    ) -> Result<LinkId, SimulationError> {
        let label_a = self.node(a)?.label.clone();
        let label_b = self.node(b)?.label.clone();

        if a == b {
            return Err(SimulationError::Configuration(format!(
                "node `{label_a}` cannot be linked to itself"
            )));
        }

        if bandwidth_bps == 0 {
            return Err(SimulationError::InvalidRate(format!(
                "link between `{label_a}` and `{label_b}` has a data rate of zero"
            )));
        }

        let loss = options.packet_loss_ratio;
        if !(0.0..=1.0).contains(&loss) {
            return Err(SimulationError::Configuration(format!(
                "link between `{label_a}` and `{label_b}` has a packet loss ratio outside [0, 1] ({loss})"
            )));
        }

        let id = LinkId(self.links.len() as u32);
        let name: Arc<str> = format!("{label_a}-{label_b}").into();
        tracing::debug!(
            "linking `{label_a}` and `{label_b}` ({bandwidth_bps} bps, {:.3} ms)",
            delay.as_secs_f64() * 1000.0
        );

        self.links.push(NetworkLink {
            id,
            name,
            endpoints: ordered(a, b),
            bandwidth_bps,
            delay,
            packet_loss_ratio: loss,
        });

        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);

        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SimulationError> {
        self.nodes.get(&id).ok_or(SimulationError::UnknownNode(id))
    }

    /// All nodes, in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn links(&self) -> &[NetworkLink] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&NetworkLink> {
        self.links.get(id.0 as usize)
    }

    /// The link used to forward packets between two adjacent nodes
    ///
    /// When multiple links join the same nodes, the one with the lowest delay wins (and, among
    /// those, the one created first).
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<&NetworkLink> {
        self.links
            .iter()
            .filter(|l| l.connects(a, b))
            .min_by_key(|l| (l.delay, l.id))
    }

    /// Nodes directly linked to `node`, in ascending id order
    pub fn neighbors_of(&self, node: NodeId) -> Result<Vec<NodeId>, SimulationError> {
        self.adjacency
            .get(&node)
            .map(|neighbors| neighbors.iter().copied().collect())
            .ok_or(SimulationError::UnknownNode(node))
    }

    pub fn position_at(&self, node: NodeId, time: Duration) -> Result<Position, SimulationError> {
        let node = self.node(node)?;
        Ok(node.mobility.position_at(node.initial_position, time))
    }
}

/// Converts a user-supplied delay in seconds into a link delay
pub fn link_delay_from_secs(secs: f64) -> Result<Duration, SimulationError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| SimulationError::InvalidRate(format!("invalid link delay: {secs} s")))
}
