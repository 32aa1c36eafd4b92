//! Discrete-event simulation of a WAN
//!
//! A [`simulation::Simulation`] owns a static [`network::Topology`], the periodic flows of a
//! [`traffic::TrafficGenerator`] and a [`stats::FlowStatsAggregator`] that observes every send,
//! delivery and loss. Runs are reproducible: identical inputs and seeds yield identical results.

pub mod error;
pub mod network;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod trace;
pub mod traffic;
pub mod util;
pub mod visualization;

pub use error::SimulationError;
pub use simulation::{Simulation, SimulationConfig};

#[cfg(test)]
mod test {
    use crate::SimulationError;
    use crate::network::Topology;
    use crate::network::link::LinkOptions;
    use crate::network::mobility::Mobility;
    use crate::network::node::{NodeId, NodeRole, Position};
    use crate::simulation::{Simulation, SimulationConfig};
    use crate::trace::step::SimulationStepKind;
    use crate::trace::verifier::SimulationVerifier;
    use crate::traffic::{FlowKey, FlowSpec};
    use bon::builder;
    use std::time::Duration;

    const BANDWIDTH_100_MBPS: u64 = 1000 * 1000 * 100;

    struct TestNetwork {
        topology: Topology,
        client: NodeId,
        server: NodeId,
    }

    /// A client and a server joined by a chain of routers
    #[builder]
    fn line_network(
        routers: Option<u32>,
        bandwidth_bps: Option<u64>,
        link_delay: Option<Duration>,
        packet_loss_ratio: Option<f64>,
    ) -> TestNetwork {
        let routers = routers.unwrap_or(0);
        let bandwidth_bps = bandwidth_bps.unwrap_or(BANDWIDTH_100_MBPS);
        let link_delay = link_delay.unwrap_or(Duration::from_millis(5));
        let options = LinkOptions {
            packet_loss_ratio: packet_loss_ratio.unwrap_or(0.0),
        };

        let mut topology = Topology::new();
        let fixed = |x: f64| (Position::new(x, 0.0), Mobility::Fixed);

        let (position, mobility) = fixed(0.0);
        let client = topology
            .add_node(NodeRole::Sensor, "client", position, mobility)
            .unwrap();

        let mut previous = client;
        for i in 0..routers {
            let (position, mobility) = fixed(10.0 * (i + 1) as f64);
            let router = topology
                .add_node(NodeRole::WanRouter, format!("router{i}"), position, mobility)
                .unwrap();
            topology
                .add_link_with_options(previous, router, bandwidth_bps, link_delay, options.clone())
                .unwrap();
            previous = router;
        }

        let (position, mobility) = fixed(100.0);
        let server = topology
            .add_node(NodeRole::CloudServer, "server", position, mobility)
            .unwrap();
        topology
            .add_link_with_options(previous, server, bandwidth_bps, link_delay, options)
            .unwrap();

        TestNetwork {
            topology,
            client,
            server,
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn flow(source: NodeId, destination: NodeId) -> FlowSpec {
        FlowSpec {
            source,
            destination,
            destination_port: 9,
            packet_size_bytes: 512,
            interval: secs(0.5),
            max_packets: 10,
            start: secs(2.0),
            stop: secs(30.0),
        }
    }

    fn simulation(network: TestNetwork, seed: u64) -> (Simulation, NodeId, NodeId) {
        let config = SimulationConfig {
            seed,
            ..SimulationConfig::default()
        };
        (
            Simulation::new(network.topology, config),
            network.client,
            network.server,
        )
    }

    #[test]
    fn test_single_link_flow() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation.add_flow(flow(client, server)).unwrap();
        simulation.run(secs(30.0)).unwrap();

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 10);
        assert_eq!(summary.packets_received, 10);
        assert_eq!(summary.packets_lost, 0);
        assert_eq!(summary.loss_rate_percent, 0.0);
        assert!((summary.throughput_kbps - (10.0 * 512.0 * 8.0) / 30_000.0).abs() < 1e-9);
        assert!((summary.average_delay_ms - 5.0).abs() < 1e-9);

        // Each packet arrives exactly one link delay after being sent
        let stepper = simulation.tracer().stepper();
        let sent = stepper.sent_packets();
        assert_eq!(sent.len(), 10);
        for id in sent {
            let hops = stepper.get_packet_hops(id);
            assert_eq!(hops.len(), 2);
            let (sent_at, _) = hops[0];
            assert_eq!(
                stepper.get_packet_delivered_at(id),
                Some(sent_at + Duration::from_millis(5))
            );
            assert_eq!(
                stepper.get_packet_arrived_at(id, server),
                Some(sent_at + Duration::from_millis(5))
            );
        }

        // The first send happens one interval after the start
        assert_eq!(
            simulation.stats().iter().next().unwrap().1.first_tx,
            Some(secs(2.5))
        );
    }

    #[test]
    fn test_zero_max_packets_sends_nothing() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation
            .add_flow(FlowSpec {
                max_packets: 0,
                ..flow(client, server)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 0);
        assert_eq!(summary.packets_received, 0);
        assert_eq!(summary.loss_rate_percent, 0.0);
        assert_eq!(summary.average_delay_ms, 0.0);
    }

    #[test]
    fn test_stop_between_sends() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation
            .add_flow(FlowSpec {
                max_packets: 100,
                interval: secs(1.0),
                stop: secs(4.5),
                ..flow(client, server)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        // Sends at 3.0 and 4.0, then the stop event wins over the send at 5.0
        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 2);

        let steps = simulation.tracer().steps();
        let last_send = steps
            .iter()
            .filter(|s| matches!(s.kind, SimulationStepKind::PacketSent(_)))
            .map(|s| s.relative_time)
            .max();
        assert_eq!(last_send, Some(secs(4.0)));
    }

    #[test]
    fn test_stop_at_send_instant_wins() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation
            .add_flow(FlowSpec {
                max_packets: 100,
                interval: secs(1.0),
                stop: secs(5.0),
                ..flow(client, server)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        assert_eq!(simulation.summary().packets_transmitted, 2);
    }

    #[test]
    fn test_flows_sharing_a_source_are_independent() {
        let TestNetwork {
            mut topology,
            client,
            server,
        } = line_network().routers(1).call();
        let other = topology
            .add_node(
                NodeRole::Office,
                "other",
                Position::default(),
                Mobility::Fixed,
            )
            .unwrap();
        topology
            .add_link(NodeId(1), other, BANDWIDTH_100_MBPS, Duration::from_millis(2))
            .unwrap();

        let mut simulation = Simulation::new(topology, SimulationConfig::default());
        simulation.add_flow(flow(client, server)).unwrap();
        simulation
            .add_flow(FlowSpec {
                max_packets: 4,
                ..flow(client, other)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        let stats: Vec<_> = simulation.stats().iter().collect();
        assert_eq!(stats.len(), 2);

        let (to_server, server_stats) = stats[0];
        assert_eq!(to_server.destination, server);
        assert_eq!(server_stats.tx_packets, 10);
        assert_eq!(server_stats.rx_packets, 10);
        assert_eq!(server_stats.mean_delay(), Some(Duration::from_millis(10)));

        let (to_other, other_stats) = stats[1];
        assert_eq!(to_other.destination, other);
        assert_eq!(other_stats.tx_packets, 4);
        assert_eq!(other_stats.rx_packets, 4);
        assert_eq!(other_stats.mean_delay(), Some(Duration::from_millis(7)));
    }

    #[test]
    fn test_empty_simulation_has_zero_loss_rate() {
        let (mut simulation, _, _) = simulation(line_network().call(), 42);
        simulation.run(secs(30.0)).unwrap();

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 0);
        assert_eq!(summary.loss_rate_percent, 0.0);
        assert_eq!(summary.throughput_kbps, 0.0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let run = |seed| {
            let network = line_network()
                .routers(2)
                .packet_loss_ratio(0.2)
                .call();
            let (mut simulation, client, server) = simulation(network, seed);
            simulation
                .add_flow(FlowSpec {
                    max_packets: 200,
                    interval: secs(0.1),
                    ..flow(client, server)
                })
                .unwrap();
            simulation.run(secs(30.0)).unwrap();

            let summary = serde_json::to_string(&simulation.summary()).unwrap();
            let steps = serde_json::to_string(&simulation.tracer().steps()).unwrap();
            (summary, steps)
        };

        let (summary, steps) = run(7);
        let (summary_again, steps_again) = run(7);
        assert_eq!(summary, summary_again);
        assert_eq!(steps, steps_again);

        let (_, other_steps) = run(8);
        assert_ne!(steps, other_steps);
    }

    #[test]
    fn test_multi_hop_delivery_respects_link_delays() {
        let network = line_network()
            .routers(3)
            .link_delay(Duration::from_millis(4))
            .packet_loss_ratio(0.1)
            .call();
        let topology = network.topology.clone();
        let (mut simulation, client, server) = simulation(network, 3);
        simulation
            .add_flow(FlowSpec {
                max_packets: 50,
                ..flow(client, server)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 50);
        assert!(summary.packets_received <= summary.packets_transmitted);
        assert!(summary.packets_lost > 0);

        let stepper = simulation.tracer().stepper();
        for id in stepper.sent_packets() {
            let hops = stepper.get_packet_hops(id);
            if let Some(delivered_at) = stepper.get_packet_delivered_at(id) {
                assert_eq!(hops.len(), 5);
                assert!(delivered_at >= hops[0].0 + Duration::from_millis(16));
            }
        }

        let verified = SimulationVerifier::new(simulation.tracer().steps(), &topology)
            .verify()
            .unwrap();
        let client_stats = &verified.stats_by_node[&client];
        let server_stats = &verified.stats_by_node[&server];
        assert_eq!(client_stats.sent.packets, 50);
        assert_eq!(server_stats.received.packets, summary.packets_received);
        let lost: u64 = verified.stats_by_node.values().map(|s| s.lost.packets).sum();
        assert_eq!(lost, summary.packets_lost);
    }

    #[test]
    fn test_echo_server_replies_are_separate_flows() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation
            .install_echo_server(server, 9, secs(1.0), secs(30.0))
            .unwrap();
        simulation
            .add_flow(FlowSpec {
                max_packets: 3,
                ..flow(client, server)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        let summary = simulation.summary();
        assert_eq!(summary.flows, 2);
        assert_eq!(summary.packets_transmitted, 6);
        assert_eq!(summary.packets_received, 6);

        let reply = FlowKey {
            source: server,
            source_port: 9,
            destination: client,
            destination_port: 49153,
        };
        let reply_stats = simulation.stats().flow_stats(&reply).unwrap();
        assert_eq!(reply_stats.rx_packets, 3);
        assert_eq!(
            reply_stats.first_tx,
            Some(secs(2.5) + Duration::from_millis(5))
        );

        assert!(matches!(
            simulation.install_echo_server(server, 9, secs(1.0), secs(2.0)),
            Err(SimulationError::Duplicate(_))
        ));
    }

    #[test]
    fn test_inactive_echo_server_does_not_reply() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation
            .install_echo_server(server, 9, secs(10.0), secs(30.0))
            .unwrap();
        simulation
            .add_flow(FlowSpec {
                max_packets: 3,
                ..flow(client, server)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        assert_eq!(simulation.summary().packets_transmitted, 3);
    }

    #[test]
    fn test_unreachable_destination_loses_packets() {
        let TestNetwork {
            mut topology,
            client,
            ..
        } = line_network().call();
        let island = topology
            .add_node(
                NodeRole::Citizen,
                "island",
                Position::default(),
                Mobility::Fixed,
            )
            .unwrap();

        let verify_topology = topology.clone();
        let mut simulation = Simulation::new(topology, SimulationConfig::default());
        simulation
            .add_flow(FlowSpec {
                max_packets: 5,
                ..flow(client, island)
            })
            .unwrap();
        simulation.run(secs(30.0)).unwrap();

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 5);
        assert_eq!(summary.packets_received, 0);
        assert_eq!(summary.packets_lost, 5);
        assert_eq!(summary.loss_rate_percent, 100.0);

        let verified = SimulationVerifier::new(simulation.tracer().steps(), &verify_topology)
            .verify()
            .unwrap();
        assert_eq!(verified.stats_by_node[&client].lost.packets, 5);
    }

    #[test]
    fn test_packets_in_flight_at_horizon_are_lost() {
        let (mut simulation, client, server) = simulation(line_network().call(), 42);
        simulation.add_flow(flow(client, server)).unwrap();

        // The last packet is sent at 7.0s and would arrive at 7.005s
        let outcome = simulation.run(secs(7.002)).unwrap();
        assert!(outcome.discarded_events > 0);

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 10);
        assert_eq!(summary.packets_received, 9);
        assert_eq!(summary.packets_lost, 1);
        assert_eq!(simulation.now(), secs(7.002));
    }

    #[test]
    fn test_losses_after_the_last_event_stay_in_the_trace() {
        let mut topology = Topology::new();
        let mut node = |label: &str, x: f64| {
            topology
                .add_node(
                    NodeRole::WanRouter,
                    label,
                    Position::new(x, 0.0),
                    Mobility::Fixed,
                )
                .unwrap()
        };
        let a = node("a", 0.0);
        let b = node("b", 10.0);
        let c = node("c", 20.0);
        topology.add_link(a, b, BANDWIDTH_100_MBPS, secs(2.0)).unwrap();
        topology
            .add_link_with_options(
                b,
                c,
                BANDWIDTH_100_MBPS,
                secs(0.01),
                LinkOptions {
                    packet_loss_ratio: 1.0,
                },
            )
            .unwrap();

        let verify_topology = topology.clone();
        let mut simulation = Simulation::new(topology, SimulationConfig::default());
        simulation
            .add_flow(FlowSpec {
                interval: secs(1.0),
                max_packets: 100,
                start: secs(1.0),
                stop: secs(7.5),
                ..flow(a, c)
            })
            .unwrap();

        // The last packet is dropped at b at 9s, after the flow's stop event
        simulation.run(secs(10.0)).unwrap();
        assert!(simulation.now() < secs(9.0));

        let summary = simulation.summary();
        assert_eq!(summary.packets_transmitted, 7);
        assert_eq!(summary.packets_lost, 7);

        let steps = simulation.tracer().steps();
        let traced_losses = steps
            .iter()
            .filter(|s| matches!(s.kind, SimulationStepKind::PacketLost(_)))
            .count() as u64;
        assert_eq!(traced_losses, summary.packets_lost);

        let verified = SimulationVerifier::new(steps, &verify_topology).verify().unwrap();
        assert_eq!(verified.in_flight_at_end, 0);
        let lost: u64 = verified
            .stats_by_node
            .values()
            .map(|stats| stats.lost.packets)
            .sum();
        assert_eq!(lost, 7);
    }

    #[test]
    fn test_invalid_setup_is_rejected() {
        let (mut simulation, client, _) = simulation(line_network().call(), 42);

        assert_eq!(
            simulation.add_flow(flow(client, NodeId(99))),
            Err(SimulationError::UnknownNode(NodeId(99)))
        );
        assert_eq!(
            simulation.install_echo_server(NodeId(99), 9, secs(0.0), secs(1.0)),
            Err(SimulationError::UnknownNode(NodeId(99)))
        );
        assert!(matches!(
            simulation.run(Duration::ZERO),
            Err(SimulationError::Configuration(_))
        ));
    }
}
