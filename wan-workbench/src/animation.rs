use anyhow::Context;
use serde::Serialize;
use serde_with::{DurationMilliSeconds, serde_as};
use sim_network::network::node::{NodeId, Position};
use sim_network::visualization::{NodeDescription, VisualizationSink};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Collects node descriptions and their positions over time, to be rendered by an external viewer
#[derive(Serialize, Default)]
pub struct AnimationExporter {
    nodes: Vec<NodeDescription>,
    positions: Vec<PositionSample>,
}

#[serde_as]
#[derive(Serialize)]
struct PositionSample {
    node: NodeId,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    time_ms: Duration,
    x: f64,
    y: f64,
}

impl AnimationExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self).context("failed to serialize animation")?;
        fs::write(path, json)
            .with_context(|| format!("failed to store animation at `{}`", path.display()))
    }
}

impl VisualizationSink for AnimationExporter {
    fn describe_node(&mut self, node: NodeDescription) {
        self.nodes.push(node);
    }

    fn update_position(&mut self, node: NodeId, time: Duration, position: Position) {
        self.positions.push(PositionSample {
            node,
            time_ms: time,
            x: position.x,
            y: position.y,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use sim_network::network::Topology;
    use sim_network::network::mobility::Mobility;
    use sim_network::network::node::NodeRole;
    use sim_network::visualization;

    #[test]
    fn test_animation_json_layout() {
        let mut topology = Topology::new();
        topology
            .add_node(
                NodeRole::AccessPoint,
                "Mobile-AP",
                Position::new(200.0, 130.0),
                Mobility::Fixed,
            )
            .unwrap();

        let mut exporter = AnimationExporter::new();
        visualization::export(
            &topology,
            &mut exporter,
            Duration::from_millis(500),
            Duration::from_secs(1),
        )
        .unwrap();

        let json = serde_json::to_value(&exporter).unwrap();
        assert_eq!(json["nodes"][0]["label"], "Mobile-AP");
        assert_eq!(json["nodes"][0]["role"], "accessPoint");
        assert_eq!(json["nodes"][0]["color"], serde_json::json!([255, 215, 0]));
        assert_eq!(json["positions"].as_array().unwrap().len(), 3);
        assert_eq!(json["positions"][2]["time_ms"], 1000);
        assert_eq!(json["positions"][2]["x"], 200.0);
    }
}
