//! The simulation driver
//!
//! Ties the scheduler, the topology and its collaborators, the traffic generator and the
//! statistics aggregator together. Handlers run one at a time and every "wait" is expressed as a
//! future event, so a run is a deterministic function of its inputs.

use crate::error::SimulationError;
use crate::network::Topology;
use crate::network::delivery::{DeliveryModel, DeliveryOutcome, LinkDelivery, TransmissionModel};
use crate::network::node::NodeId;
use crate::network::routing::{RoutingOracle, ShortestPathRouting, resolve_path};
use crate::scheduler::{RunOutcome, Scheduler};
use crate::stats::{FlowStatsAggregator, SummaryReport};
use crate::trace::tracer::SimulationStepTracer;
use crate::traffic::{FlowAction, FlowId, FlowKey, FlowSpec, Packet, PacketId, TrafficGenerator};
use crate::visualization::{self, VisualizationSink};
use fastrand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum SimulationEvent {
    Start(FlowId),
    Send(FlowId),
    Deliver(Packet),
    Stop(FlowId),
}

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Seed for every random decision taken during the run (e.g. link losses)
    pub seed: u64,
    pub transmission: TransmissionModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            transmission: TransmissionModel::default(),
        }
    }
}

/// Answers every packet received on `port` with a packet of the same size, while active
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EchoServer {
    pub node: NodeId,
    pub port: u16,
    pub start: Duration,
    pub stop: Duration,
}

impl EchoServer {
    fn is_active(&self, now: Duration) -> bool {
        self.start <= now && now < self.stop
    }
}

pub struct Simulation {
    topology: Topology,
    routing: Box<dyn RoutingOracle>,
    delivery: Box<dyn DeliveryModel>,
    traffic: TrafficGenerator,
    stats: FlowStatsAggregator,
    scheduler: Scheduler<SimulationEvent>,
    tracer: Arc<SimulationStepTracer>,
    echo_servers: Vec<EchoServer>,
    next_packet_id: u64,
    duration: Duration,
}

impl Simulation {
    /// Creates a simulation over a finished topology, using shortest path routing and link-based
    /// delivery
    pub fn new(topology: Topology, config: SimulationConfig) -> Self {
        let routing = ShortestPathRouting::compute(&topology);
        let delivery = LinkDelivery::new(Rng::with_seed(config.seed), config.transmission);
        Self::with_collaborators(topology, Box::new(routing), Box::new(delivery))
    }

    pub fn with_collaborators(
        topology: Topology,
        routing: Box<dyn RoutingOracle>,
        delivery: Box<dyn DeliveryModel>,
    ) -> Self {
        tracing::info!(
            "network topology ready: {} nodes and {} links",
            topology.node_count(),
            topology.links().len()
        );

        Self {
            topology,
            routing,
            delivery,
            traffic: TrafficGenerator::new(),
            stats: FlowStatsAggregator::new(),
            scheduler: Scheduler::new(),
            tracer: Arc::new(SimulationStepTracer::new()),
            echo_servers: Vec::new(),
            next_packet_id: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn traffic(&self) -> &TrafficGenerator {
        &self.traffic
    }

    pub fn stats(&self) -> &FlowStatsAggregator {
        &self.stats
    }

    pub fn tracer(&self) -> &Arc<SimulationStepTracer> {
        &self.tracer
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Registers a flow and schedules its start and stop events
    pub fn add_flow(&mut self, spec: FlowSpec) -> Result<FlowId, SimulationError> {
        self.topology.node(spec.source)?;
        self.topology.node(spec.destination)?;

        let (start, stop) = (spec.start, spec.stop);
        let id = self.traffic.add_flow(spec)?;
        self.scheduler.schedule(start, SimulationEvent::Start(id))?;
        self.scheduler.schedule(stop, SimulationEvent::Stop(id))?;

        let flow = self.traffic.flow(id)?;
        tracing::debug!(
            "installed flow {id} ({}): {} packets of {} bytes every {:?}",
            flow.key(),
            flow.spec().max_packets,
            flow.spec().packet_size_bytes,
            flow.spec().interval,
        );

        Ok(id)
    }

    pub fn install_echo_server(
        &mut self,
        node: NodeId,
        port: u16,
        start: Duration,
        stop: Duration,
    ) -> Result<(), SimulationError> {
        let label = self.topology.node(node)?.label().clone();
        if self
            .echo_servers
            .iter()
            .any(|s| s.node == node && s.port == port)
        {
            return Err(SimulationError::Duplicate(format!(
                "echo server port {port} on `{label}`"
            )));
        }

        tracing::debug!("installed echo server on `{label}`, port {port}");
        self.echo_servers.push(EchoServer {
            node,
            port,
            start,
            stop,
        });

        Ok(())
    }

    /// Runs the simulation until `stop_time`, or until no events remain
    pub fn run(&mut self, stop_time: Duration) -> Result<RunOutcome, SimulationError> {
        if stop_time.is_zero() {
            return Err(SimulationError::Configuration(
                "simulation duration must be positive".to_string(),
            ));
        }

        tracing::info!(
            "running simulation for {:.2}s ({} flows, {} echo servers)",
            stop_time.as_secs_f64(),
            self.traffic.flows().count(),
            self.echo_servers.len(),
        );

        // The scheduler hands itself to the handler, so it cannot stay borrowed through `self`
        let mut scheduler = std::mem::take(&mut self.scheduler);
        let result = scheduler.run(stop_time, |scheduler, event| self.handle(scheduler, event));
        self.scheduler = scheduler;
        let outcome = result?;

        self.duration = stop_time;

        // Losses are traced when the packet is sent, so the queue may drain before they happen
        let horizon = if outcome.stopped_early {
            self.scheduler.now()
        } else {
            stop_time
        };
        self.tracer.discard_after(horizon);

        tracing::info!(
            "simulation finished at {:.2}s: {} events processed, {} discarded",
            self.scheduler.now().as_secs_f64(),
            outcome.processed_events,
            outcome.discarded_events,
        );

        Ok(outcome)
    }

    /// Summary of the last run, with throughput computed over its full duration
    pub fn summary(&self) -> SummaryReport {
        self.stats.summarize(self.duration)
    }

    pub fn export_visualization(
        &self,
        sink: &mut dyn VisualizationSink,
        sample_interval: Duration,
        until: Duration,
    ) -> Result<u64, SimulationError> {
        visualization::export(&self.topology, sink, sample_interval, until)
    }

    fn handle(
        &mut self,
        scheduler: &mut Scheduler<SimulationEvent>,
        event: SimulationEvent,
    ) -> Result<(), SimulationError> {
        let now = scheduler.now();
        tracing::trace!("{:.6}s processing {event:?}", now.as_secs_f64());

        match event {
            SimulationEvent::Start(id) => {
                let action = self.traffic.on_start(id, now)?;
                if let FlowAction::ScheduleSend(_) = action {
                    let key = self.traffic.flow(id)?.key();
                    self.tracer.track_flow_started(now, id, key);
                }

                self.apply(scheduler, id, action)?;
            }
            SimulationEvent::Send(id) => {
                if let Some(packet) = self.traffic.on_send(id, now)? {
                    self.transmit(scheduler, packet.flow, packet.sequence, packet.size_bytes)?;
                    self.apply(scheduler, id, packet.then)?;
                }
            }
            SimulationEvent::Deliver(packet) => self.deliver(scheduler, packet)?,
            SimulationEvent::Stop(id) => {
                let action = self.traffic.on_stop(id)?;
                self.apply(scheduler, id, action)?;
            }
        }

        Ok(())
    }

    fn apply(
        &mut self,
        scheduler: &mut Scheduler<SimulationEvent>,
        id: FlowId,
        action: FlowAction,
    ) -> Result<(), SimulationError> {
        match action {
            FlowAction::Nothing => {}
            FlowAction::ScheduleSend(time) => scheduler.schedule(time, SimulationEvent::Send(id))?,
            FlowAction::Completed => {
                let flow = self.traffic.flow(id)?;
                tracing::debug!(
                    "{:.2}s flow {id} completed after sending {} packets",
                    scheduler.now().as_secs_f64(),
                    flow.sent_count()
                );
                self.tracer
                    .track_flow_completed(scheduler.now(), id, flow.key());
            }
        }

        Ok(())
    }

    /// Creates a packet and hands it to the delivery model
    fn transmit(
        &mut self,
        scheduler: &mut Scheduler<SimulationEvent>,
        flow: FlowKey,
        sequence: u64,
        size_bytes: u32,
    ) -> Result<(), SimulationError> {
        let now = scheduler.now();
        let packet = Packet {
            id: PacketId(self.next_packet_id),
            flow,
            sequence,
            size_bytes,
            sent_at: now,
        };
        self.next_packet_id += 1;

        self.stats.on_sent(flow, size_bytes, now);
        self.tracer.track_packet_sent(&packet);

        let path = resolve_path(
            self.routing.as_ref(),
            &self.topology,
            flow.source,
            flow.destination,
        )
        .unwrap_or_default();

        match self.delivery.deliver_or_drop(&self.topology, &packet, &path) {
            DeliveryOutcome::Delivered { arrival, hops } => {
                for hop in &hops {
                    self.tracer.track_hop(&packet, hop);
                }

                scheduler.schedule(arrival, SimulationEvent::Deliver(packet))?;
            }
            DeliveryOutcome::Lost { node, reason, hops } => {
                for hop in &hops {
                    self.tracer.track_hop(&packet, hop);
                }

                let lost_at = hops.last().map(|h| h.arrival).unwrap_or(now);
                self.stats.on_lost(flow);
                self.tracer
                    .track_packet_lost(lost_at, &packet, node, reason, &self.topology);
            }
        }

        Ok(())
    }

    fn deliver(
        &mut self,
        scheduler: &mut Scheduler<SimulationEvent>,
        packet: Packet,
    ) -> Result<(), SimulationError> {
        let now = scheduler.now();
        self.stats
            .on_delivered(packet.flow, packet.size_bytes, packet.sent_at, now);
        self.tracer.track_packet_delivered(now, &packet);

        let echo = self.echo_servers.iter().any(|s| {
            s.node == packet.flow.destination
                && s.port == packet.flow.destination_port
                && s.is_active(now)
        });

        if echo {
            self.transmit(
                scheduler,
                packet.flow.reversed(),
                packet.sequence,
                packet.size_bytes,
            )?;
        }

        Ok(())
    }
}
