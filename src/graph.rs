use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::schema::Schema;

pub const ROOT_NODE_ID: &str = "1";
pub const ROOT_LABEL: &str = "Root Object";

/// Default box size, shared with the layout configuration.
pub const NODE_WIDTH: f32 = 172.0;
pub const NODE_HEIGHT: f32 = 36.0;

const FIRST_CHILD_INDEX: usize = 2;
const INITIAL_CHILD_SPACING: f32 = 200.0;
const INITIAL_CHILD_OFFSET_Y: f32 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB", alias = "TD", alias = "tb", alias = "td")]
    TopToBottom,
    #[serde(rename = "LR", alias = "lr")]
    LeftToRight,
}

impl Direction {
    pub fn as_token(self) -> &'static str {
        match self {
            Direction::TopToBottom => "TB",
            Direction::LeftToRight => "LR",
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight)
    }

    /// Connector sides as `(source, target)`.
    pub fn connector_sides(self) -> (Side, Side) {
        match self {
            Direction::TopToBottom => (Side::Bottom, Side::Top),
            Direction::LeftToRight => (Side::Right, Side::Left),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported direction '{}'; supported values are TB (vertical) and LR (horizontal)",
            self.0
        )
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tb" | "td" | "vertical" | "top-to-bottom" => Ok(Direction::TopToBottom),
            "lr" | "horizontal" | "left-to-right" => Ok(Direction::LeftToRight),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Property,
    Input,
    Output,
}

impl NodeKind {
    /// Node type understood by the browser view.
    pub fn flow_type(self) -> &'static str {
        match self {
            NodeKind::Root | NodeKind::Input => "input",
            NodeKind::Property => "default",
            NodeKind::Output => "output",
        }
    }

    pub fn accepts_incoming(self) -> bool {
        !matches!(self, NodeKind::Root | NodeKind::Input)
    }

    pub fn emits_outgoing(self) -> bool {
        !matches!(self, NodeKind::Output)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: Point,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_side: Option<Side>,
}

impl SchemaNode {
    fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>, position: Point) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            description: None,
            position,
            width: NODE_WIDTH,
            height: NODE_HEIGHT,
            source_side: None,
            target_side: None,
        }
    }

    /// Point where outgoing edges attach.
    pub fn source_anchor(&self) -> Point {
        self.anchor(self.source_side.unwrap_or(Side::Bottom))
    }

    /// Point where incoming edges attach.
    pub fn target_anchor(&self) -> Point {
        self.anchor(self.target_side.unwrap_or(Side::Top))
    }

    pub fn anchor(&self, side: Side) -> Point {
        let Point { x, y } = self.position;
        match side {
            Side::Top => Point::new(x + self.width / 2.0, y),
            Side::Bottom => Point::new(x + self.width / 2.0, y + self.height),
            Side::Left => Point::new(x, y + self.height / 2.0),
            Side::Right => Point::new(x + self.width, y + self.height / 2.0),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.position.x + self.width / 2.0,
            self.position.y + self.height / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl SchemaEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: edge_identifier(source, target),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

pub fn edge_identifier(source: &str, target: &str) -> String {
    format!("edge-{source}-{target}")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Nodes and edges of one diagram, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaGraph {
    pub nodes: Vec<SchemaNode>,
    pub edges: Vec<SchemaEdge>,
}

impl SchemaGraph {
    /// Fan the top-level properties out of a single root node.
    ///
    /// Ids are deterministic: the root is `"1"`, children are `node-2`,
    /// `node-3`, ... in property order, and each edge is
    /// `edge-<source>-<target>`. Nested properties are not expanded.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut nodes = Vec::with_capacity(schema.len() + 1);
        let mut edges = Vec::with_capacity(schema.len());

        let mut root = SchemaNode::new(ROOT_NODE_ID, NodeKind::Root, ROOT_LABEL, Point::default());
        root.description = schema.title.clone();
        nodes.push(root);

        for (index, (name, property)) in schema.properties.iter().enumerate() {
            let id = format!("node-{}", FIRST_CHILD_INDEX + index);
            let mut node = SchemaNode::new(
                id.clone(),
                NodeKind::Property,
                format!("{name} ({})", property.type_label()),
                Point::new(index as f32 * INITIAL_CHILD_SPACING, INITIAL_CHILD_OFFSET_Y),
            );
            node.description = property.description.clone();
            nodes.push(node);
            edges.push(SchemaEdge::new(ROOT_NODE_ID, &id));
        }

        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&SchemaNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut SchemaNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    pub fn edge_ids(&self) -> Vec<&str> {
        self.edges.iter().map(|edge| edge.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check id uniqueness, edge endpoints and connector kinds.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        let mut edge_ids = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphError::DuplicateEdge(edge.id.clone()));
            }

            let source = self.node(&edge.source).ok_or_else(|| GraphError::DanglingEdge {
                edge: edge.id.clone(),
                node: edge.source.clone(),
            })?;
            let target = self.node(&edge.target).ok_or_else(|| GraphError::DanglingEdge {
                edge: edge.id.clone(),
                node: edge.target.clone(),
            })?;

            if !source.kind.emits_outgoing() {
                return Err(GraphError::OutgoingFromSink {
                    node: source.id.clone(),
                    edge: edge.id.clone(),
                });
            }
            if !target.kind.accepts_incoming() {
                return Err(GraphError::IncomingToSource {
                    node: target.id.clone(),
                    edge: edge.id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Bounding box of all node boxes.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.nodes.iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            min_x: first.position.x,
            min_y: first.position.y,
            max_x: first.position.x + first.width,
            max_y: first.position.y + first.height,
        };

        for node in iter {
            bounds.min_x = bounds.min_x.min(node.position.x);
            bounds.min_y = bounds.min_y.min(node.position.y);
            bounds.max_x = bounds.max_x.max(node.position.x + node.width);
            bounds.max_y = bounds.max_y.max(node.position.y + node.height);
        }

        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Schema {
        Schema::parse(
            r#"{"type":"object","title":"Person","properties":{"name":{"type":"string"},"age":{"type":"number"}}}"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_root_and_one_child_per_property() {
        let graph = SchemaGraph::from_schema(&person());

        assert_eq!(graph.node_ids(), ["1", "node-2", "node-3"]);
        assert_eq!(graph.edge_ids(), ["edge-1-node-2", "edge-1-node-3"]);
        assert!(graph.edges.iter().all(|edge| edge.source == ROOT_NODE_ID));

        let root = graph.node("1").unwrap();
        assert_eq!(root.kind, NodeKind::Root);
        assert_eq!(root.label, "Root Object");
        assert_eq!(root.description.as_deref(), Some("Person"));

        assert_eq!(graph.node("node-2").unwrap().label, "name (string)");
        assert_eq!(graph.node("node-3").unwrap().label, "age (number)");
        graph.validate().unwrap();
    }

    #[test]
    fn initial_positions_spread_children() {
        let graph = SchemaGraph::from_schema(&person());
        assert_eq!(graph.nodes[0].position, Point::new(0.0, 0.0));
        assert_eq!(graph.nodes[1].position, Point::new(0.0, 100.0));
        assert_eq!(graph.nodes[2].position, Point::new(200.0, 100.0));
    }

    #[test]
    fn empty_schema_yields_lonely_root() {
        let graph = SchemaGraph::from_schema(&Schema::default());
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn validate_flags_broken_graphs() {
        let mut graph = SchemaGraph::from_schema(&person());
        graph.edges.push(SchemaEdge::new("node-2", "ghost"));
        assert_eq!(
            graph.validate(),
            Err(GraphError::DanglingEdge {
                edge: "edge-node-2-ghost".to_string(),
                node: "ghost".to_string(),
            })
        );

        let mut graph = SchemaGraph::from_schema(&person());
        graph.edges.push(SchemaEdge::new("node-2", "1"));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::IncomingToSource { .. })
        ));

        let mut graph = SchemaGraph::from_schema(&person());
        graph.nodes[2].kind = NodeKind::Output;
        graph.edges.push(SchemaEdge::new("node-3", "node-2"));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::OutgoingFromSink { .. })
        ));

        let mut graph = SchemaGraph::from_schema(&person());
        graph.nodes[2].id = "node-2".to_string();
        assert_eq!(
            graph.validate(),
            Err(GraphError::DuplicateNode("node-2".to_string()))
        );
    }

    #[test]
    fn direction_tokens() {
        assert_eq!("lr".parse::<Direction>().unwrap(), Direction::LeftToRight);
        assert_eq!("TD".parse::<Direction>().unwrap(), Direction::TopToBottom);
        assert_eq!(
            "vertical".parse::<Direction>().unwrap(),
            Direction::TopToBottom
        );
        assert!("diagonal".parse::<Direction>().is_err());
        assert_eq!(
            serde_json::to_string(&Direction::LeftToRight).unwrap(),
            "\"LR\""
        );
    }

    #[test]
    fn anchors_follow_sides() {
        let mut node = SchemaNode::new("a", NodeKind::Property, "a", Point::new(10.0, 20.0));
        node.source_side = Some(Side::Right);
        node.target_side = Some(Side::Left);
        assert_eq!(node.source_anchor(), Point::new(182.0, 38.0));
        assert_eq!(node.target_anchor(), Point::new(10.0, 38.0));
    }
}
