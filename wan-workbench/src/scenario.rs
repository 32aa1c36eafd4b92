//! Scenarios: a topology plus the traffic that runs over it

use crate::config::cli::CommunityCloudOpt;
use crate::config::simulation_time;
use fastrand::Rng;
use sim_network::network::Topology;
use sim_network::network::mobility::{Mobility, RandomWalk, Rectangle};
use sim_network::network::node::{NodeId, NodeRole, Position};
use sim_network::simulation::EchoServer;
use sim_network::traffic::FlowSpec;
use sim_network::{Simulation, SimulationConfig, SimulationError};
use std::f64::consts::TAU;
use std::time::Duration;

pub struct Scenario {
    pub title: String,
    /// Scenario-specific lines of the configuration report
    pub parameters: Vec<(String, String)>,
    pub topology: Topology,
    pub flows: Vec<FlowSpec>,
    pub echo_servers: Vec<EchoServer>,
    pub duration: Duration,
}

impl Scenario {
    pub fn into_simulation(self, config: SimulationConfig) -> Result<Simulation, SimulationError> {
        let mut simulation = Simulation::new(self.topology, config);
        for server in self.echo_servers {
            simulation.install_echo_server(server.node, server.port, server.start, server.stop)?;
        }

        for flow in self.flows {
            simulation.add_flow(flow)?;
        }

        Ok(simulation)
    }
}

const ECHO_PORT: u16 = 9;

const WAN_BANDWIDTH_BPS: u64 = 100_000_000;
const WAN_DELAY: Duration = Duration::from_millis(5);
const LOCAL_BANDWIDTH_BPS: u64 = 50_000_000;
const LOCAL_DELAY: Duration = Duration::from_millis(2);
const WIRELESS_BANDWIDTH_BPS: u64 = 11_000_000;
const WIRELESS_DELAY: Duration = Duration::from_millis(1);

const CITIZEN_AREA_CENTER: Position = Position { x: 200.0, y: 200.0 };
const CITIZEN_AREA_RADIUS: f64 = 50.0;

struct FlowProfile {
    packet_size_bytes: u32,
    interval: Duration,
    max_packets: u64,
    first_start: Duration,
    start_step: Duration,
}

const SENSOR_FLOWS: FlowProfile = FlowProfile {
    packet_size_bytes: 512,
    interval: Duration::from_millis(500),
    max_packets: 100,
    first_start: Duration::from_secs(2),
    start_step: Duration::from_millis(200),
};

const OFFICE_FLOWS: FlowProfile = FlowProfile {
    packet_size_bytes: 1024,
    interval: Duration::from_secs(1),
    max_packets: 50,
    first_start: Duration::from_secs(3),
    start_step: Duration::from_millis(500),
};

const CITIZEN_FLOWS: FlowProfile = FlowProfile {
    packet_size_bytes: 256,
    interval: Duration::from_millis(800),
    max_packets: 30,
    first_start: Duration::from_secs(4),
    start_step: Duration::from_millis(300),
};

impl FlowProfile {
    fn flow(&self, index: u32, source: NodeId, destination: NodeId, stop: Duration) -> FlowSpec {
        FlowSpec {
            source,
            destination,
            destination_port: ECHO_PORT,
            packet_size_bytes: self.packet_size_bytes,
            interval: self.interval,
            max_packets: self.max_packets,
            start: self.first_start + self.start_step * index,
            stop,
        }
    }
}

/// Position of the `index`-th node of a group laid out in rows of `columns`
fn grid(origin: Position, columns: u32, spacing: f64, index: u32) -> Position {
    Position::new(
        origin.x + (index % columns) as f64 * spacing,
        origin.y + (index / columns) as f64 * spacing,
    )
}

/// The community cloud WAN: sensors, offices and roaming citizens reporting to a cloud server over
/// a three-router backbone
pub fn community_cloud(
    options: &CommunityCloudOpt,
    seed: u64,
) -> Result<Scenario, SimulationError> {
    let duration = simulation_time(options.time)?;
    let mut rng = Rng::with_seed(seed);
    let mut topology = Topology::new();

    let cloud = topology.add_node(
        NodeRole::CloudServer,
        "Cloud-Server",
        Position::new(200.0, 20.0),
        Mobility::Fixed,
    )?;

    let router_positions = [
        Position::new(200.0, 80.0),
        Position::new(80.0, 140.0),
        Position::new(320.0, 140.0),
    ];
    let mut routers = Vec::new();
    for (i, position) in router_positions.into_iter().enumerate() {
        routers.push(topology.add_node(
            NodeRole::WanRouter,
            format!("WAN-Router-{i}"),
            position,
            Mobility::Fixed,
        )?);
    }

    let mut sensors = Vec::new();
    for i in 0..options.sensors {
        sensors.push(topology.add_node(
            NodeRole::Sensor,
            format!("Sensor-{}", i + 1),
            grid(Position::new(0.0, 200.0), 4, 25.0, i),
            Mobility::Fixed,
        )?);
    }

    let mut offices = Vec::new();
    for i in 0..options.offices {
        offices.push(topology.add_node(
            NodeRole::Office,
            format!("Office-{}", i + 1),
            grid(Position::new(325.0, 200.0), 4, 25.0, i),
            Mobility::Fixed,
        )?);
    }

    let access_point = topology.add_node(
        NodeRole::AccessPoint,
        "Mobile-AP",
        Position::new(200.0, 130.0),
        Mobility::Fixed,
    )?;

    let bounds = Rectangle::new(100.0, 300.0, 100.0, 300.0);
    let mut citizens = Vec::new();
    for i in 0..options.citizens {
        let rho = rng.f64() * CITIZEN_AREA_RADIUS;
        let theta = rng.f64() * TAU;
        let position = Position::new(
            CITIZEN_AREA_CENTER.x + rho * theta.cos(),
            CITIZEN_AREA_CENTER.y + rho * theta.sin(),
        );

        citizens.push(topology.add_node(
            NodeRole::Citizen,
            format!("Citizen-{}", i + 1),
            position,
            Mobility::RandomWalk(RandomWalk::new(bounds, rng.u64(..))),
        )?);
    }

    // Backbone
    topology.add_link(cloud, routers[0], WAN_BANDWIDTH_BPS, WAN_DELAY)?;
    for (a, b) in [(0, 1), (1, 2), (2, 0)] {
        topology.add_link(routers[a], routers[b], WAN_BANDWIDTH_BPS, WAN_DELAY)?;
    }

    // Access
    for &sensor in &sensors {
        topology.add_link(sensor, routers[1], LOCAL_BANDWIDTH_BPS, LOCAL_DELAY)?;
    }
    for &office in &offices {
        topology.add_link(office, routers[2], LOCAL_BANDWIDTH_BPS, LOCAL_DELAY)?;
    }
    topology.add_link(access_point, routers[0], LOCAL_BANDWIDTH_BPS, LOCAL_DELAY)?;
    for &citizen in &citizens {
        topology.add_link(citizen, access_point, WIRELESS_BANDWIDTH_BPS, WIRELESS_DELAY)?;
    }

    let echo_servers = vec![EchoServer {
        node: cloud,
        port: ECHO_PORT,
        start: Duration::from_secs(1),
        stop: duration,
    }];

    let groups = [
        (&sensors, &SENSOR_FLOWS),
        (&offices, &OFFICE_FLOWS),
        (&citizens, &CITIZEN_FLOWS),
    ];
    let mut flows = Vec::new();
    for (nodes, profile) in groups {
        for (i, &node) in (0..).zip(nodes.iter()) {
            flows.push(profile.flow(i, node, cloud, duration));
        }
    }

    let parameters = vec![
        ("Traffic Sensors".to_string(), options.sensors.to_string()),
        ("Government Offices".to_string(), options.offices.to_string()),
        ("Citizens (Mobile)".to_string(), options.citizens.to_string()),
    ];

    Ok(Scenario {
        title: "COMMUNITY CLOUD WAN - Smart City Simulation".to_string(),
        parameters,
        topology,
        flows,
        echo_servers,
        duration,
    })
}
