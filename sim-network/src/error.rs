use crate::network::node::NodeId;
use crate::traffic::FlowId;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error(
        "attempted to schedule an event at {requested:?}, which is before the current simulation time ({now:?})"
    )]
    InvalidTime { requested: Duration, now: Duration },
    #[error("network node `{0}` was referenced but does not exist")]
    UnknownNode(NodeId),
    #[error("flow `{0}` was referenced but does not exist")]
    UnknownFlow(FlowId),
    #[error("{0} is already in use")]
    Duplicate(String),
    #[error("invalid link rate or delay: {0}")]
    InvalidRate(String),
}
