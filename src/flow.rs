//! JSON node/edge document consumed by the browser view and written by
//! `--output-format json`.

use serde::{Deserialize, Serialize};

use crate::graph::{Point, SchemaGraph, Side};

pub const EDGE_TYPE: &str = "step";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub data: FlowNodeData,
    pub position: Point,
    pub width: f32,
    pub height: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_position: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_position: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeData {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
}

impl FlowDocument {
    pub fn from_graph(graph: &SchemaGraph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| FlowNode {
                id: node.id.clone(),
                node_type: node.kind.flow_type().to_string(),
                data: FlowNodeData {
                    label: node.label.clone(),
                    description: node.description.clone(),
                },
                position: node.position,
                width: node.width,
                height: node.height,
                source_position: node.source_side,
                target_position: node.target_side,
            })
            .collect();

        let edges = graph
            .edges
            .iter()
            .map(|edge| FlowEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                edge_type: EDGE_TYPE.to_string(),
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Direction;
    use crate::layout::{LayoutAdapter, LayoutConfig};
    use crate::schema::Schema;

    #[test]
    fn document_uses_view_field_names() {
        let schema = Schema::parse(r#"{"properties":{"id":{"type":"integer"}}}"#).unwrap();
        let graph = LayoutAdapter::new(LayoutConfig::default())
            .unwrap()
            .layout_graph(&SchemaGraph::from_schema(&schema), Direction::LeftToRight)
            .unwrap();

        let value = serde_json::to_value(FlowDocument::from_graph(&graph)).unwrap();

        assert_eq!(value["nodes"][0]["type"], "input");
        assert_eq!(value["nodes"][0]["data"]["label"], "Root Object");
        assert_eq!(value["nodes"][1]["type"], "default");
        assert_eq!(value["nodes"][1]["data"]["label"], "id (integer)");
        assert_eq!(value["nodes"][1]["sourcePosition"], "right");
        assert_eq!(value["nodes"][1]["targetPosition"], "left");
        assert_eq!(value["edges"][0]["id"], "edge-1-node-2");
        assert_eq!(value["edges"][0]["type"], "step");
    }
}
