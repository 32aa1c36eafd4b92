use crate::network::Topology;
use crate::network::node::NodeId;
use std::collections::{HashMap, VecDeque};

/// Resolves the next hop towards a destination
///
/// The core never traverses the topology multi-hop itself: it asks the oracle, one node at a time.
pub trait RoutingOracle {
    fn next_hop(&self, topology: &Topology, at: NodeId, destination: NodeId) -> Option<NodeId>;
}

/// Follows the oracle from `source` to `destination`, returning every visited node (both ends
/// included)
///
/// Returns `None` if the destination is unreachable or if the oracle sends the packet in circles.
pub fn resolve_path(
    oracle: &dyn RoutingOracle,
    topology: &Topology,
    source: NodeId,
    destination: NodeId,
) -> Option<Vec<NodeId>> {
    let mut path = vec![source];
    let mut current = source;
    while current != destination {
        // A loop-free path never visits more nodes than the topology holds
        if path.len() > topology.node_count() {
            tracing::warn!("routing loop detected from {source} to {destination}");
            return None;
        }

        let next = oracle.next_hop(topology, current, destination)?;
        topology.link_between(current, next)?;

        path.push(next);
        current = next;
    }

    Some(path)
}

/// Minimum hop count routing, with tables computed once from the immutable topology
///
/// Ties between equally short paths are broken in favor of the neighbor with the lowest id.
#[derive(Default)]
pub struct ShortestPathRouting {
    /// Map from (current node, destination) to the next hop
    next_hops: HashMap<(NodeId, NodeId), NodeId>,
}

impl ShortestPathRouting {
    pub fn compute(topology: &Topology) -> Self {
        let mut next_hops = HashMap::new();

        for destination in topology.nodes().map(|n| n.id()) {
            let distances = hop_distances_to(topology, destination);

            for (&node, &distance) in &distances {
                if node == destination {
                    continue;
                }

                let next = topology
                    .neighbors_of(node)
                    .unwrap_or_default()
                    .into_iter()
                    .find(|neighbor| distances.get(neighbor) == Some(&(distance - 1)));

                if let Some(next) = next {
                    next_hops.insert((node, destination), next);
                }
            }
        }

        Self { next_hops }
    }
}

impl RoutingOracle for ShortestPathRouting {
    fn next_hop(&self, _topology: &Topology, at: NodeId, destination: NodeId) -> Option<NodeId> {
        self.next_hops.get(&(at, destination)).copied()
    }
}

/// Breadth-first search outwards from `destination`
fn hop_distances_to(topology: &Topology, destination: NodeId) -> HashMap<NodeId, u32> {
    let mut distances = HashMap::new();
    let mut queue = VecDeque::new();

    distances.insert(destination, 0);
    queue.push_back(destination);

    while let Some(node) = queue.pop_front() {
        let distance = distances[&node];
        for neighbor in topology.neighbors_of(node).unwrap_or_default() {
            if !distances.contains_key(&neighbor) {
                distances.insert(neighbor, distance + 1);
                queue.push_back(neighbor);
            }
        }
    }

    distances
}
