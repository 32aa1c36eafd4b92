//! Periodic application traffic
//!
//! Each flow walks through `Pending -> Active -> Completed`. The generator itself never touches
//! the scheduler: its transitions return a [`FlowAction`] that the simulation driver turns into
//! events, which keeps the state machine testable on its own.

use crate::error::SimulationError;
use crate::network::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Ephemeral source port assigned to the first flow
pub const FIRST_EPHEMERAL_PORT: u16 = 49153;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u32);

impl Display for FlowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// The identity under which traffic is classified for statistics
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub source: NodeId,
    pub source_port: u16,
    pub destination: NodeId,
    pub destination_port: u16,
}

impl FlowKey {
    /// The key of traffic travelling in the opposite direction
    pub fn reversed(self) -> FlowKey {
        FlowKey {
            source: self.destination,
            source_port: self.destination_port,
            destination: self.source,
            destination_port: self.source_port,
        }
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source, self.source_port, self.destination, self.destination_port
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlowSpec {
    pub source: NodeId,
    pub destination: NodeId,
    pub destination_port: u16,
    pub packet_size_bytes: u32,
    pub interval: Duration,
    pub max_packets: u64,
    pub start: Duration,
    pub stop: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowState {
    Pending,
    Active,
    Completed,
}

#[derive(Clone, Debug)]
pub struct Flow {
    id: FlowId,
    key: FlowKey,
    spec: FlowSpec,
    state: FlowState,
    sent_count: u64,
}

impl Flow {
    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn key(&self) -> FlowKey {
        self.key
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }
}

/// What the driver must do after a flow transition
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowAction {
    /// The event was stale (e.g. a send for a completed flow)
    Nothing,
    ScheduleSend(Duration),
    /// The flow just entered [`FlowState::Completed`]
    Completed,
}

/// A packet that the generator wants sent
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutgoingPacket {
    pub flow: FlowKey,
    pub sequence: u64,
    pub size_bytes: u32,
    /// What happens to the flow once the packet is out
    pub then: FlowAction,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub u64);

impl Display for PacketId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One unit of traffic, alive between its send and its delivery (or loss)
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub id: PacketId,
    pub flow: FlowKey,
    pub sequence: u64,
    pub size_bytes: u32,
    pub sent_at: Duration,
}

#[derive(Default)]
pub struct TrafficGenerator {
    flows: Vec<Flow>,
}

impl TrafficGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a flow in the `Pending` state
    ///
    /// Flows are unique by source, destination and destination port. Each one gets its own
    /// ephemeral source port.
    pub fn add_flow(&mut self, spec: FlowSpec) -> Result<FlowId, SimulationError> {
        if spec.source == spec.destination {
            return Err(SimulationError::Configuration(format!(
                "flow from {} cannot target its own source",
                spec.source
            )));
        }

        if spec.interval.is_zero() {
            return Err(SimulationError::Configuration(format!(
                "flow from {} to {} has a zero send interval",
                spec.source, spec.destination
            )));
        }

        if spec.packet_size_bytes == 0 {
            return Err(SimulationError::Configuration(format!(
                "flow from {} to {} has empty packets",
                spec.source, spec.destination
            )));
        }

        let duplicate = self.flows.iter().any(|f| {
            f.spec.source == spec.source
                && f.spec.destination == spec.destination
                && f.spec.destination_port == spec.destination_port
        });
        if duplicate {
            return Err(SimulationError::Duplicate(format!(
                "flow from {} to {} on port {}",
                spec.source, spec.destination, spec.destination_port
            )));
        }

        let index = self.flows.len();
        let source_port = u16::try_from(index)
            .ok()
            .and_then(|i| FIRST_EPHEMERAL_PORT.checked_add(i))
            .ok_or_else(|| {
                SimulationError::Configuration("ran out of ephemeral ports for flows".to_string())
            })?;

        let id = FlowId(index as u32);
        self.flows.push(Flow {
            id,
            key: FlowKey {
                source: spec.source,
                source_port,
                destination: spec.destination,
                destination_port: spec.destination_port,
            },
            spec,
            state: FlowState::Pending,
            sent_count: 0,
        });

        Ok(id)
    }

    pub fn flow(&self, id: FlowId) -> Result<&Flow, SimulationError> {
        self.flows
            .get(id.0 as usize)
            .ok_or(SimulationError::UnknownFlow(id))
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter()
    }

    fn flow_mut(&mut self, id: FlowId) -> Result<&mut Flow, SimulationError> {
        self.flows
            .get_mut(id.0 as usize)
            .ok_or(SimulationError::UnknownFlow(id))
    }

    /// Handles the flow's start event
    pub fn on_start(&mut self, id: FlowId, now: Duration) -> Result<FlowAction, SimulationError> {
        let flow = self.flow_mut(id)?;
        if flow.state != FlowState::Pending {
            return Ok(FlowAction::Nothing);
        }

        if flow.spec.max_packets == 0 {
            flow.state = FlowState::Completed;
            return Ok(FlowAction::Completed);
        }

        flow.state = FlowState::Active;
        Ok(FlowAction::ScheduleSend(now + flow.spec.interval))
    }

    /// Handles a send event, returning the packet to put on the network (if any)
    pub fn on_send(
        &mut self,
        id: FlowId,
        now: Duration,
    ) -> Result<Option<OutgoingPacket>, SimulationError> {
        let flow = self.flow_mut(id)?;
        if flow.state != FlowState::Active || now >= flow.spec.stop {
            return Ok(None);
        }

        let sequence = flow.sent_count;
        flow.sent_count += 1;

        let then = if flow.sent_count >= flow.spec.max_packets {
            flow.state = FlowState::Completed;
            FlowAction::Completed
        } else {
            FlowAction::ScheduleSend(now + flow.spec.interval)
        };

        Ok(Some(OutgoingPacket {
            flow: flow.key,
            sequence,
            size_bytes: flow.spec.packet_size_bytes,
            then,
        }))
    }

    /// Handles the flow's stop event, which takes precedence over any pending send
    pub fn on_stop(&mut self, id: FlowId) -> Result<FlowAction, SimulationError> {
        let flow = self.flow_mut(id)?;
        if flow.state == FlowState::Completed {
            return Ok(FlowAction::Nothing);
        }

        flow.state = FlowState::Completed;
        Ok(FlowAction::Completed)
    }
}
