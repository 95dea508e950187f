//! State behind the interactive view: the current schema text and the laid
//! out node/edge collections built from it.

use log::{debug, warn};

use crate::error::{LayoutError, SchemaFlowError};
use crate::graph::{Bounds, Direction, Point, SchemaGraph};
use crate::layout::LayoutAdapter;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChange {
    Unchanged,
    Rebuilt,
}

/// A rebuilt diagram that has not been swapped in yet.
#[derive(Debug)]
pub struct PreparedSource {
    text: String,
    title: Option<String>,
    graph: SchemaGraph,
    direction: Direction,
}

impl PreparedSource {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug)]
pub struct DiagramSession {
    source: String,
    rejected_source: Option<String>,
    title: Option<String>,
    graph: SchemaGraph,
    direction: Direction,
    adapter: LayoutAdapter,
    revision: u64,
    last_error: Option<String>,
}

impl DiagramSession {
    /// An empty session. The first [`set_source`](Self::set_source) builds
    /// the diagram.
    pub fn new(adapter: LayoutAdapter) -> Self {
        let direction = adapter.config().direction;
        Self {
            source: String::new(),
            rejected_source: None,
            title: None,
            graph: SchemaGraph::default(),
            direction,
            adapter,
            revision: 0,
            last_error: None,
        }
    }

    pub fn with_source(adapter: LayoutAdapter, text: &str) -> Result<Self, SchemaFlowError> {
        let mut session = Self::new(adapter);
        session.set_source(text)?;
        Ok(session)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Bumped on every visible change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Why the most recent text could not be shown, if it could not.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.graph.bounds()
    }

    /// Whether `text` is what the diagram already shows, or what was last
    /// rejected. Either way rebuilding from it changes nothing.
    pub fn is_current(&self, text: &str) -> bool {
        (self.revision > 0 && text == self.source) || self.rejected_source.as_deref() == Some(text)
    }

    /// Rebuild nodes and edges from new schema text.
    ///
    /// The whole diagram is replaced, laid out in the configured default
    /// direction. If the text cannot be parsed or laid out nothing changes
    /// except [`last_error`](Self::last_error).
    pub fn set_source(&mut self, text: &str) -> Result<SourceChange, SchemaFlowError> {
        if text == self.source && self.revision > 0 {
            return Ok(SourceChange::Unchanged);
        }

        let prepared = self.prepare(text)?;
        self.commit(prepared);
        Ok(SourceChange::Rebuilt)
    }

    /// Build the diagram for `text` without showing it. A failure is recorded
    /// like in [`set_source`](Self::set_source).
    pub fn prepare(&mut self, text: &str) -> Result<PreparedSource, SchemaFlowError> {
        match self.build(text) {
            Ok((schema, graph, direction)) => Ok(PreparedSource {
                text: text.to_string(),
                title: schema.title,
                graph,
                direction,
            }),
            Err(err) => {
                warn!("keeping previous diagram, schema text rejected: {err}");
                self.last_error = Some(err.to_string());
                self.rejected_source = Some(text.to_string());
                Err(err)
            }
        }
    }

    pub fn commit(&mut self, prepared: PreparedSource) {
        self.source = prepared.text;
        self.title = prepared.title;
        self.graph = prepared.graph;
        self.direction = prepared.direction;
        self.last_error = None;
        self.rejected_source = None;
        self.revision += 1;
        debug!(
            "rebuilt diagram revision {} with {} nodes",
            self.revision,
            self.graph.nodes.len()
        );
    }

    fn build(&mut self, text: &str) -> Result<(Schema, SchemaGraph, Direction), SchemaFlowError> {
        let schema = Schema::parse(text)?;
        let graph = SchemaGraph::from_schema(&schema);
        graph.validate()?;
        let direction = self.adapter.config().direction;
        let graph = self.adapter.layout_graph(&graph, direction)?;
        Ok((schema, graph, direction))
    }

    /// Re-run only the layout pass over the current nodes and edges.
    pub fn relayout(&mut self, direction: Direction) -> Result<(), LayoutError> {
        let graph = self.adapter.layout_graph(&self.graph, direction)?;
        self.graph = graph;
        self.direction = direction;
        self.revision += 1;
        debug!("re-laid out revision {} ({direction})", self.revision);
        Ok(())
    }

    /// Move one node, as a drag in the view does. Returns `false` for an
    /// unknown id.
    pub fn move_node(&mut self, id: &str, position: Point) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        node.position = position;
        self.revision += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Side;
    use crate::layout::{LayoutConfig, LayoutEngineKind};

    const PERSON: &str = r#"{"type":"object","title":"Person","properties":{"name":{"type":"string"},"age":{"type":"number"}}}"#;

    fn session() -> DiagramSession {
        let config = LayoutConfig {
            engine: LayoutEngineKind::Layered,
            ..LayoutConfig::default()
        };
        DiagramSession::with_source(LayoutAdapter::new(config).unwrap(), PERSON).unwrap()
    }

    #[test]
    fn builds_from_text() {
        let session = session();
        assert_eq!(session.graph().node_ids(), ["1", "node-2", "node-3"]);
        assert_eq!(session.title(), Some("Person"));
        assert_eq!(session.direction(), Direction::TopToBottom);
        assert_eq!(session.revision(), 1);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn malformed_text_leaves_diagram_untouched() {
        let mut session = session();
        let before = session.graph().clone();

        let err = session.set_source("{\"properties\": {").unwrap_err();
        assert!(err.is_parse());
        assert_eq!(session.graph(), &before);
        assert_eq!(session.source(), PERSON);
        assert_eq!(session.revision(), 1);
        assert!(session.last_error().is_some());

        session
            .set_source(r#"{"properties":{"only":{"type":"boolean"}}}"#)
            .unwrap();
        assert!(session.last_error().is_none());
        assert_eq!(session.graph().nodes.len(), 2);
    }

    #[test]
    fn prepared_text_is_invisible_until_committed() {
        let mut session = session();
        let prepared = session
            .prepare(r#"{"properties":{"b":{"type":"number"}}}"#)
            .unwrap();
        assert_eq!(session.source(), PERSON);
        assert_eq!(session.graph().nodes.len(), 3);

        session.commit(prepared);
        assert_eq!(session.graph().node("node-2").unwrap().label, "b (number)");
        assert_eq!(session.revision(), 2);
    }

    #[test]
    fn remembers_rejected_text() {
        let mut session = session();
        let broken = "{\"properties\": {";
        assert!(!session.is_current(broken));
        assert!(session.set_source(broken).is_err());
        assert!(session.is_current(broken));
        assert!(session.is_current(PERSON));

        session
            .set_source(r#"{"properties":{"id":{"type":"string"}}}"#)
            .unwrap();
        assert!(!session.is_current(broken));
    }

    #[test]
    fn identical_text_is_a_no_op() {
        let mut session = session();
        assert_eq!(session.set_source(PERSON).unwrap(), SourceChange::Unchanged);
        assert_eq!(session.revision(), 1);
    }

    #[test]
    fn relayout_changes_only_geometry() {
        let mut session = session();
        let before = session.graph().clone();

        session.relayout(Direction::LeftToRight).unwrap();
        let after = session.graph();

        assert_eq!(session.direction(), Direction::LeftToRight);
        assert_eq!(before.node_ids(), after.node_ids());
        assert_eq!(before.edges, after.edges);
        assert!(after.nodes.iter().all(|n| n.source_side == Some(Side::Right)));
        assert_ne!(before.nodes[0].position, after.nodes[0].position);
    }

    #[test]
    fn new_text_resets_to_default_direction() {
        let mut session = session();
        session.relayout(Direction::LeftToRight).unwrap();
        session
            .set_source(r#"{"properties":{"id":{"type":"string"}}}"#)
            .unwrap();
        assert_eq!(session.direction(), Direction::TopToBottom);
    }

    #[test]
    fn dragging_moves_a_single_node() {
        let mut session = session();
        assert!(session.move_node("node-2", Point::new(500.0, 500.0)));
        assert_eq!(
            session.graph().node("node-2").unwrap().position,
            Point::new(500.0, 500.0)
        );
        assert!(!session.move_node("ghost", Point::default()));

        session.relayout(Direction::TopToBottom).unwrap();
        assert_ne!(
            session.graph().node("node-2").unwrap().position,
            Point::new(500.0, 500.0)
        );
    }
}
