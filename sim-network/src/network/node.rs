use crate::network::mobility::Mobility;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeRole {
    CloudServer,
    WanRouter,
    Sensor,
    Office,
    AccessPoint,
    Citizen,
}

impl NodeRole {
    /// The color used to render nodes of this role, as RGB
    pub fn color(self) -> Rgb {
        match self {
            NodeRole::CloudServer => Rgb(0, 0, 255),
            NodeRole::WanRouter => Rgb(0, 255, 0),
            NodeRole::Sensor => Rgb(255, 165, 0),
            NodeRole::Office => Rgb(255, 0, 255),
            NodeRole::AccessPoint => Rgb(255, 215, 0),
            NodeRole::Citizen => Rgb(173, 216, 230),
        }
    }

    /// The size used to render nodes of this role
    pub fn display_size(self) -> f64 {
        match self {
            NodeRole::CloudServer => 15.0,
            NodeRole::WanRouter => 10.0,
            _ => 1.0,
        }
    }
}

impl Display for NodeRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeRole::CloudServer => "cloud server",
            NodeRole::WanRouter => "WAN router",
            NodeRole::Sensor => "sensor",
            NodeRole::Office => "office",
            NodeRole::AccessPoint => "access point",
            NodeRole::Citizen => "citizen",
        };

        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) label: Arc<str>,
    pub(crate) role: NodeRole,
    pub(crate) initial_position: Position,
    pub(crate) mobility: Mobility,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &Arc<str> {
        &self.label
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn initial_position(&self) -> Position {
        self.initial_position
    }

    pub fn mobility(&self) -> &Mobility {
        &self.mobility
    }
}
