use sim_network::network::Topology;
use sim_network::network::node::NodeId;
use sim_network::stats::FlowStatsAggregator;
use sim_network::trace::stats::PacketStats;
use sim_network::trace::verifier::VerifiedSimulation;

pub const SEPARATOR: &str = "================================================================";

pub fn print_banner(title: &str) {
    println!("{SEPARATOR}");
    println!("{title:^64}");
    println!("{SEPARATOR}");
}

/// Prints a `label: value` line, with values aligned in a single column
pub fn print_parameter(label: &str, value: impl std::fmt::Display) {
    println!("  {:<21}{value}", format!("{label}:"));
}

fn print_packet_stats(what: &str, stats: &PacketStats) {
    println!("  * {what}: {} ({} bytes)", stats.packets, stats.bytes);
}

pub fn print_node_stats(verified_simulation: &VerifiedSimulation, topology: &Topology) {
    println!("--- Node stats ---");
    for node in topology.nodes() {
        let Some(stats) = verified_simulation.stats_by_node.get(&node.id()) else {
            continue;
        };

        println!("* {} ({}, {})", node.label(), node.id(), node.role());
        print_packet_stats("Sent packets", &stats.sent);
        print_packet_stats("Received packets", &stats.received);
        if stats.forwarded.packets > 0 {
            print_packet_stats("Forwarded packets", &stats.forwarded);
        }
        if stats.lost.packets > 0 {
            print_packet_stats("Lost packets", &stats.lost);
        }
    }

    if verified_simulation.in_flight_at_end > 0 {
        println!(
            "* {} packets were still in flight when the simulation stopped",
            verified_simulation.in_flight_at_end
        );
    }
}

fn label(topology: &Topology, node: NodeId) -> String {
    topology
        .node(node)
        .map(|n| n.label().to_string())
        .unwrap_or_else(|_| node.to_string())
}

pub fn print_flow_stats(aggregator: &FlowStatsAggregator, topology: &Topology) {
    println!("--- Flow stats ---");
    for (flow, stats) in aggregator.iter() {
        let delay = match stats.mean_delay() {
            Some(delay) => format!("{:.3} ms", delay.as_secs_f64() * 1000.0),
            None => "n/a".to_string(),
        };

        println!(
            "* {}:{} -> {}:{}",
            label(topology, flow.source),
            flow.source_port,
            label(topology, flow.destination),
            flow.destination_port
        );
        println!(
            "  * {} sent, {} received, {} lost (mean delay: {delay})",
            stats.tx_packets,
            stats.rx_packets,
            stats.lost_packets()
        );
    }
}
