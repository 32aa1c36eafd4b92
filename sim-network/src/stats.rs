//! Per-flow statistics
//!
//! The aggregator is a pure observer: it is told about every send, delivery and loss, and never
//! influences what the network does with a packet.

use crate::traffic::FlowKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Sum of the one-way delays of all received packets
    pub delay_sum: Duration,
    /// Packets explicitly reported as lost (packets still in flight when the run ends are not
    /// counted here)
    pub dropped_packets: u64,
    pub first_tx: Option<Duration>,
    pub last_rx: Option<Duration>,
}

impl FlowStats {
    pub fn lost_packets(&self) -> u64 {
        self.tx_packets.saturating_sub(self.rx_packets)
    }

    pub fn rx_bits(&self) -> u64 {
        self.rx_bytes * 8
    }

    /// Mean one-way delay, if at least one packet was received
    pub fn mean_delay(&self) -> Option<Duration> {
        if self.rx_packets == 0 {
            return None;
        }

        let nanos = self.delay_sum.as_nanos() / u128::from(self.rx_packets);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    fn mean_delay_secs(&self) -> Option<f64> {
        if self.rx_packets == 0 {
            return None;
        }

        Some(self.delay_sum.as_secs_f64() / self.rx_packets as f64)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlowStatsAggregator {
    flows: BTreeMap<FlowKey, FlowStats>,
}

impl FlowStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sent(&mut self, flow: FlowKey, size_bytes: u32, time: Duration) {
        let stats = self.flows.entry(flow).or_default();
        stats.tx_packets += 1;
        stats.tx_bytes += size_bytes as u64;
        stats.first_tx.get_or_insert(time);
    }

    pub fn on_delivered(
        &mut self,
        flow: FlowKey,
        size_bytes: u32,
        sent_at: Duration,
        received_at: Duration,
    ) {
        let stats = self.flows.entry(flow).or_default();
        stats.rx_packets += 1;
        stats.rx_bytes += size_bytes as u64;
        stats.delay_sum += received_at.saturating_sub(sent_at);
        stats.last_rx = Some(received_at);
    }

    /// Loss is implicit in `tx - rx`, so this only feeds the diagnostic drop counter
    pub fn on_lost(&mut self, flow: FlowKey) {
        self.flows.entry(flow).or_default().dropped_packets += 1;
    }

    pub fn flow_stats(&self, flow: &FlowKey) -> Option<&FlowStats> {
        self.flows.get(flow)
    }

    /// All observed flows, in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, &FlowStats)> {
        self.flows.iter()
    }

    pub fn summarize(&self, simulation_duration: Duration) -> SummaryReport {
        let packets_transmitted: u64 = self.flows.values().map(|s| s.tx_packets).sum();
        let packets_received: u64 = self.flows.values().map(|s| s.rx_packets).sum();
        let packets_lost = packets_transmitted.saturating_sub(packets_received);

        let loss_rate_percent = if packets_transmitted == 0 {
            0.0
        } else {
            packets_lost as f64 / packets_transmitted as f64 * 100.0
        };

        let rx_bits: u64 = self.flows.values().map(|s| s.rx_bits()).sum();
        let duration_secs = simulation_duration.as_secs_f64();
        let throughput_bps = if duration_secs > 0.0 {
            rx_bits as f64 / duration_secs
        } else {
            0.0
        };

        // Average of the per-flow averages, not of all packets together
        let per_flow_delays: Vec<f64> = self
            .flows
            .values()
            .filter_map(|s| s.mean_delay_secs())
            .collect();
        let average_delay_ms = if per_flow_delays.is_empty() {
            0.0
        } else {
            per_flow_delays.iter().sum::<f64>() / per_flow_delays.len() as f64 * 1000.0
        };

        SummaryReport {
            flows: self.flows.len(),
            packets_transmitted,
            packets_received,
            packets_lost,
            loss_rate_percent,
            throughput_kbps: throughput_bps / 1000.0,
            average_delay_ms,
        }
    }
}

/// End-of-run metrics, aggregated over all flows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub flows: usize,
    pub packets_transmitted: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub loss_rate_percent: f64,
    pub throughput_kbps: f64,
    pub average_delay_ms: f64,
}

impl SummaryReport {
    pub fn throughput_bps(&self) -> f64 {
        self.throughput_kbps * 1000.0
    }
}

impl Display for SummaryReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Traffic Statistics:")?;
        writeln!(f, "  Packets Transmitted:  {}", self.packets_transmitted)?;
        writeln!(f, "  Packets Received:     {}", self.packets_received)?;
        writeln!(f, "  Packets Lost:         {}", self.packets_lost)?;
        if self.packets_transmitted > 0 {
            writeln!(f, "  Packet Loss Rate:     {:.2} %", self.loss_rate_percent)?;
        }
        writeln!(f, "  Total Throughput:     {:.2} kbps", self.throughput_kbps)?;
        if self.packets_received > 0 {
            writeln!(f, "  Average Delay:        {:.3} ms", self.average_delay_ms)?;
        }

        Ok(())
    }
}
