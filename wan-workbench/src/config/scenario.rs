use crate::config::time_from_secs;
use crate::scenario::Scenario;
use serde::Deserialize;
use serde_with::{DisplayFromStr, DurationMilliSeconds, PickFirst, serde_as};
use sim_network::SimulationError;
use sim_network::network::link::LinkOptions;
use sim_network::network::mobility::{Mobility, RandomWalk, Rectangle};
use sim_network::network::node::{NodeId, NodeRole, Position};
use sim_network::network::{Topology, link_delay_from_secs};
use sim_network::simulation::EchoServer;
use sim_network::traffic::FlowSpec;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct ScenarioJson {
    nodes: Vec<NodeJson>,
    #[serde(default)]
    links: Vec<LinkJson>,
    #[serde(default)]
    flows: Vec<FlowJson>,
    #[serde(default)]
    echo_servers: Vec<EchoServerJson>,
}

#[derive(Deserialize, Clone)]
struct NodeJson {
    id: u32,
    label: String,
    role: NodeRoleJson,
    #[serde(default)]
    position: PositionJson,
    #[serde(default)]
    mobility: MobilityJson,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
enum NodeRoleJson {
    CloudServer,
    WanRouter,
    Sensor,
    Office,
    AccessPoint,
    Citizen,
}

#[derive(Deserialize, Clone, Copy, Default)]
struct PositionJson {
    x: f64,
    y: f64,
}

#[derive(Deserialize, Clone, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
enum MobilityJson {
    #[default]
    Fixed,
    RandomWalk {
        bounds: BoundsJson,
        seed: u64,
        /// Speed range in meters per second (defaults to 2-4 m/s)
        min_speed: Option<f64>,
        max_speed: Option<f64>,
        /// How long the node keeps its speed and direction (defaults to one second)
        leg_duration_ms: Option<u64>,
    },
}

#[derive(Deserialize, Clone, Copy)]
struct BoundsJson {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct LinkJson {
    source: u32,
    target: u32,
    /// The link's bandwidth, in bits per second (either a number or a numeric string)
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    bandwidth_bps: u64,
    /// The propagation delay of the link, in milliseconds
    delay_ms: f64,
    /// The ratio of packets that will be lost (the value must be between 0 and 1)
    #[serde(default)]
    packet_loss_ratio: f64,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct FlowJson {
    source: u32,
    destination: u32,
    port: u16,
    packet_size_bytes: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    interval_ms: Duration,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    max_packets: u64,
    start_s: f64,
    /// Defaults to the end of the run
    stop_s: Option<f64>,
}

#[derive(Deserialize, Clone)]
struct EchoServerJson {
    node: u32,
    port: u16,
    #[serde(default)]
    start_s: f64,
    /// Defaults to the end of the run
    stop_s: Option<f64>,
}

impl From<NodeRoleJson> for NodeRole {
    fn from(role: NodeRoleJson) -> Self {
        match role {
            NodeRoleJson::CloudServer => NodeRole::CloudServer,
            NodeRoleJson::WanRouter => NodeRole::WanRouter,
            NodeRoleJson::Sensor => NodeRole::Sensor,
            NodeRoleJson::Office => NodeRole::Office,
            NodeRoleJson::AccessPoint => NodeRole::AccessPoint,
            NodeRoleJson::Citizen => NodeRole::Citizen,
        }
    }
}

impl From<PositionJson> for Position {
    fn from(p: PositionJson) -> Self {
        Position::new(p.x, p.y)
    }
}

impl From<MobilityJson> for Mobility {
    fn from(mobility: MobilityJson) -> Self {
        match mobility {
            MobilityJson::Fixed => Mobility::Fixed,
            MobilityJson::RandomWalk {
                bounds,
                seed,
                min_speed,
                max_speed,
                leg_duration_ms,
            } => {
                let bounds =
                    Rectangle::new(bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max);
                let mut walk = RandomWalk::new(bounds, seed);
                if let Some(min_speed) = min_speed {
                    walk.min_speed = min_speed;
                }
                if let Some(max_speed) = max_speed {
                    walk.max_speed = max_speed;
                }
                if let Some(ms) = leg_duration_ms {
                    walk.leg_duration = Duration::from_millis(ms);
                }

                Mobility::RandomWalk(walk)
            }
        }
    }
}

impl ScenarioJson {
    /// Builds the topology, flows and echo servers described by the file
    ///
    /// Fails on the first invalid node, link, flow or server, before anything is simulated.
    pub fn into_scenario(
        self,
        title: String,
        duration: Duration,
    ) -> Result<Scenario, SimulationError> {
        let mut topology = Topology::new();
        for node in self.nodes {
            topology.add_node_with_id(
                NodeId(node.id),
                node.role.into(),
                node.label,
                node.position.into(),
                node.mobility.into(),
            )?;
        }

        for link in self.links {
            let delay = link_delay_from_secs(link.delay_ms / 1000.0)?;
            topology.add_link_with_options(
                NodeId(link.source),
                NodeId(link.target),
                link.bandwidth_bps,
                delay,
                LinkOptions {
                    packet_loss_ratio: link.packet_loss_ratio,
                },
            )?;
        }

        let flows = self
            .flows
            .into_iter()
            .map(|f| {
                let stop = match f.stop_s {
                    Some(stop) => time_from_secs(stop, "flow stop time")?,
                    None => duration,
                };

                Ok(FlowSpec {
                    source: NodeId(f.source),
                    destination: NodeId(f.destination),
                    destination_port: f.port,
                    packet_size_bytes: f.packet_size_bytes,
                    interval: f.interval_ms,
                    max_packets: f.max_packets,
                    start: time_from_secs(f.start_s, "flow start time")?,
                    stop,
                })
            })
            .collect::<Result<Vec<_>, SimulationError>>()?;

        let echo_servers = self
            .echo_servers
            .into_iter()
            .map(|s| {
                let stop = match s.stop_s {
                    Some(stop) => time_from_secs(stop, "echo server stop time")?,
                    None => duration,
                };

                Ok(EchoServer {
                    node: NodeId(s.node),
                    port: s.port,
                    start: time_from_secs(s.start_s, "echo server start time")?,
                    stop,
                })
            })
            .collect::<Result<Vec<_>, SimulationError>>()?;

        let parameters = vec![
            ("Nodes".to_string(), topology.node_count().to_string()),
            ("Links".to_string(), topology.links().len().to_string()),
            ("Flows".to_string(), flows.len().to_string()),
            ("Echo Servers".to_string(), echo_servers.len().to_string()),
        ];

        Ok(Scenario {
            title,
            parameters,
            topology,
            flows,
            echo_servers,
            duration,
        })
    }
}
