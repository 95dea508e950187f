//! Layout adapter: hands the node/edge graph to a layered layout engine and
//! reads positions back in the view's top-left anchor convention.
//!
//! Every node is registered as a box of the same size, so engines only decide
//! a `(rank, order)` slot per node. The adapter turns slots into box centers
//! using the configured separations, converts centers to top-left corners and
//! translates the result so the diagram starts at the origin.

mod layered;
mod sugiyama;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, LayoutError};
use crate::graph::{Direction, NODE_HEIGHT, NODE_WIDTH, Point, SchemaEdge, SchemaGraph, SchemaNode};

pub const RANK_SEPARATION: f32 = 50.0;
pub const NODE_SEPARATION: f32 = 50.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutEngineKind {
    /// Longest-path ranking with a barycenter ordering sweep. Also the
    /// fallback when the sugiyama engine fails.
    Layered,
    /// The `rust-sugiyama` crate.
    #[default]
    Sugiyama,
}

impl LayoutEngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutEngineKind::Layered => "layered",
            LayoutEngineKind::Sugiyama => "sugiyama",
        }
    }
}

impl fmt::Display for LayoutEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "layered" => Ok(LayoutEngineKind::Layered),
            "sugiyama" => Ok(LayoutEngineKind::Sugiyama),
            other => Err(format!(
                "unsupported layout engine '{other}'; supported values are layered, sugiyama"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub engine: LayoutEngineKind,
    /// Direction used when a diagram is (re)built from text.
    pub direction: Direction,
    pub node_width: f32,
    pub node_height: f32,
    pub rank_separation: f32,
    pub node_separation: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            engine: LayoutEngineKind::default(),
            direction: Direction::default(),
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            rank_separation: RANK_SEPARATION,
            node_separation: NODE_SEPARATION,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let positive = [
            ("node_width", self.node_width),
            ("node_height", self.node_height),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        let non_negative = [
            ("rank_separation", self.rank_separation),
            ("node_separation", self.node_separation),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Position of a node inside the layered drawing. `order` may be fractional
/// when an engine centers a rank against a wider one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Slot {
    pub rank: usize,
    pub order: f32,
}

pub(crate) trait RankEngine {
    /// Assign one slot per node index. `relations` hold `(source, target)`
    /// node indices.
    fn slots(&self, node_count: usize, relations: &[(usize, usize)])
    -> Result<Vec<Slot>, LayoutError>;
}

/// Node index and relation list handed to the engine. Cleared and refilled
/// on every pass.
#[derive(Debug, Default)]
struct Scratch {
    index: HashMap<String, usize>,
    relations: Vec<(usize, usize)>,
}

impl Scratch {
    fn load(&mut self, nodes: &[SchemaNode], edges: &[SchemaEdge]) -> Result<(), GraphError> {
        self.index.clear();
        self.relations.clear();

        for (position, node) in nodes.iter().enumerate() {
            if self.index.insert(node.id.clone(), position).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in edges {
            let lookup = |id: &str| {
                self.index
                    .get(id)
                    .copied()
                    .ok_or_else(|| GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: id.to_string(),
                    })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;
            self.relations.push((source, target));
        }

        Ok(())
    }
}

/// Runs layout passes. Owns its scratch graph, so a pass needs `&mut self`.
#[derive(Debug)]
pub struct LayoutAdapter {
    config: LayoutConfig,
    scratch: Scratch,
}

impl LayoutAdapter {
    pub fn new(config: LayoutConfig) -> Result<Self, LayoutError> {
        config.validate()?;
        Ok(Self {
            config,
            scratch: Scratch::default(),
        })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lay out `nodes` and return repositioned copies in the same order.
    ///
    /// Only `position`, the box size and the connector sides change; ids,
    /// labels and kinds are carried over untouched.
    pub fn layout(
        &mut self,
        nodes: &[SchemaNode],
        edges: &[SchemaEdge],
        direction: Direction,
    ) -> Result<Vec<SchemaNode>, LayoutError> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        self.scratch.load(nodes, edges)?;

        debug!(
            "laying out {} nodes and {} edges ({}, {} engine)",
            nodes.len(),
            self.scratch.relations.len(),
            direction,
            self.config.engine
        );

        let relations = &self.scratch.relations;
        let slots = match self.config.engine {
            LayoutEngineKind::Layered => layered::Engine.slots(nodes.len(), relations)?,
            LayoutEngineKind::Sugiyama => {
                match sugiyama::Engine.slots(nodes.len(), relations) {
                    Ok(slots) => slots,
                    Err(err) => {
                        warn!("sugiyama layout failed, using layered engine: {err}");
                        layered::Engine.slots(nodes.len(), relations)?
                    }
                }
            }
        };

        let width = self.config.node_width;
        let height = self.config.node_height;
        let (rank_extent, order_extent) = if direction.is_horizontal() {
            (width, height)
        } else {
            (height, width)
        };
        let rank_step = rank_extent + self.config.rank_separation;
        let order_step = order_extent + self.config.node_separation;

        let corners: Vec<Point> = slots
            .iter()
            .map(|slot| {
                let along = slot.rank as f32 * rank_step + rank_extent / 2.0;
                let across = slot.order * order_step + order_extent / 2.0;
                let center = if direction.is_horizontal() {
                    Point::new(along, across)
                } else {
                    Point::new(across, along)
                };
                Point::new(center.x - width / 2.0, center.y - height / 2.0)
            })
            .collect();

        let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let (source_side, target_side) = direction.connector_sides();

        Ok(nodes
            .iter()
            .zip(corners)
            .map(|(node, corner)| SchemaNode {
                position: Point::new(corner.x - min_x, corner.y - min_y),
                width,
                height,
                source_side: Some(source_side),
                target_side: Some(target_side),
                ..node.clone()
            })
            .collect())
    }

    /// Lay out a whole graph; edges are returned unchanged.
    pub fn layout_graph(
        &mut self,
        graph: &SchemaGraph,
        direction: Direction,
    ) -> Result<SchemaGraph, LayoutError> {
        let nodes = self.layout(&graph.nodes, &graph.edges, direction)?;
        Ok(SchemaGraph {
            nodes,
            edges: graph.edges.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Side;
    use crate::schema::Schema;

    fn graph(properties: usize) -> SchemaGraph {
        let fields: Vec<String> = (0..properties)
            .map(|i| format!("\"field{i}\":{{\"type\":\"string\"}}"))
            .collect();
        let text = format!("{{\"properties\":{{{}}}}}", fields.join(","));
        SchemaGraph::from_schema(&Schema::parse(&text).unwrap())
    }

    fn layered() -> LayoutConfig {
        LayoutConfig {
            engine: LayoutEngineKind::Layered,
            ..LayoutConfig::default()
        }
    }

    fn adapter() -> LayoutAdapter {
        LayoutAdapter::new(layered()).unwrap()
    }

    #[test]
    fn vertical_layout_places_root_above_children() {
        let laid = adapter()
            .layout_graph(&graph(3), Direction::TopToBottom)
            .unwrap();

        let root = &laid.nodes[0];
        assert_eq!(root.position.y, 0.0);
        for child in &laid.nodes[1..] {
            assert_eq!(child.position.y, NODE_HEIGHT + RANK_SEPARATION);
            assert_eq!(child.source_side, Some(Side::Bottom));
            assert_eq!(child.target_side, Some(Side::Top));
        }

        let xs: Vec<f32> = laid.nodes[1..].iter().map(|n| n.position.x).collect();
        assert_eq!(xs, [0.0, 222.0, 444.0]);
        assert_eq!(root.position.x, 222.0);
    }

    #[test]
    fn horizontal_layout_places_root_left_of_children() {
        let laid = adapter()
            .layout_graph(&graph(2), Direction::LeftToRight)
            .unwrap();

        let root = &laid.nodes[0];
        assert_eq!(root.position.x, 0.0);
        assert_eq!(root.source_side, Some(Side::Right));
        assert_eq!(root.target_side, Some(Side::Left));
        for child in &laid.nodes[1..] {
            assert_eq!(child.position.x, NODE_WIDTH + RANK_SEPARATION);
        }
        assert_eq!(laid.nodes[1].position.y, 0.0);
        assert_eq!(laid.nodes[2].position.y, NODE_HEIGHT + NODE_SEPARATION);
        assert_eq!(root.position.y, (NODE_HEIGHT + NODE_SEPARATION) / 2.0);
    }

    #[test]
    fn repeated_passes_are_identical() {
        let source = graph(5);
        let mut adapter = adapter();
        let first = adapter.layout_graph(&source, Direction::LeftToRight).unwrap();
        let second = adapter.layout_graph(&source, Direction::LeftToRight).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn switching_direction_keeps_identities() {
        let source = graph(4);
        let mut adapter = adapter();
        let vertical = adapter.layout_graph(&source, Direction::TopToBottom).unwrap();
        let horizontal = adapter.layout_graph(&vertical, Direction::LeftToRight).unwrap();

        assert_eq!(vertical.node_ids(), horizontal.node_ids());
        assert_eq!(vertical.edges, horizontal.edges);
        for (a, b) in vertical.nodes.iter().zip(&horizontal.nodes) {
            assert_eq!(a.label, b.label);
            assert_eq!(a.kind, b.kind);
        }
        assert_ne!(vertical.nodes[1].position, horizontal.nodes[1].position);
    }

    #[test]
    fn lonely_root_sits_at_origin() {
        let laid = adapter()
            .layout_graph(&graph(0), Direction::TopToBottom)
            .unwrap();
        assert_eq!(laid.nodes.len(), 1);
        assert_eq!(laid.nodes[0].position, Point::new(0.0, 0.0));
    }

    #[test]
    fn rejects_dangling_edges() {
        let mut source = graph(1);
        source.edges.push(SchemaEdge::new("1", "missing"));
        let err = adapter()
            .layout_graph(&source, Direction::TopToBottom)
            .unwrap_err();
        assert!(matches!(
            err,
            LayoutError::Graph(GraphError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn custom_box_size_is_applied() {
        let config = LayoutConfig {
            node_width: 100.0,
            node_height: 20.0,
            rank_separation: 10.0,
            node_separation: 5.0,
            ..layered()
        };
        let laid = LayoutAdapter::new(config)
            .unwrap()
            .layout_graph(&graph(2), Direction::TopToBottom)
            .unwrap();

        assert_eq!(laid.nodes[0].width, 100.0);
        assert_eq!(laid.nodes[1].position, Point::new(0.0, 30.0));
        assert_eq!(laid.nodes[2].position, Point::new(105.0, 30.0));
    }

    #[test]
    fn sugiyama_is_the_default_engine() {
        assert_eq!(LayoutConfig::default().engine, LayoutEngineKind::Sugiyama);
    }

    #[test]
    fn sugiyama_star_keeps_property_order() {
        let mut adapter = LayoutAdapter::new(LayoutConfig::default()).unwrap();
        let laid = adapter
            .layout_graph(&graph(12), Direction::TopToBottom)
            .unwrap();

        let root = &laid.nodes[0];
        for child in &laid.nodes[1..] {
            assert!(child.position.y >= root.position.y + root.height);
        }

        let xs: Vec<f32> = laid.nodes[1..].iter().map(|n| n.position.x).collect();
        assert!(
            xs.windows(2).all(|pair| pair[1] - pair[0] >= NODE_WIDTH),
            "children overlap or are out of order: {xs:?}"
        );

        let again = adapter
            .layout_graph(&graph(12), Direction::TopToBottom)
            .unwrap();
        assert_eq!(laid, again);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LayoutConfig {
            node_width: 0.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(
            LayoutAdapter::new(config),
            Err(LayoutError::InvalidConfig(_))
        ));
        assert!("force".parse::<LayoutEngineKind>().is_err());
    }
}
