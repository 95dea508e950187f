//! Lay out JSON-schema-like documents as node/edge diagrams.
//!
//! The pipeline is `text -> Schema -> SchemaGraph -> LayoutAdapter -> view`:
//! [`Schema::parse`] reads the text, [`SchemaGraph::from_schema`] fans the
//! top-level properties out of a single root node, and [`LayoutAdapter`]
//! assigns positions for a [`Direction`]. The positioned graph can be written
//! as SVG, PNG or a JSON node/edge document, or served to the browser view
//! through [`DiagramSession`].

pub mod config;
pub mod error;
pub mod flow;
pub mod graph;
pub mod layout;
pub mod render;
pub mod schema;
#[cfg(feature = "server")]
pub mod serve;
pub mod session;

pub use config::{AppConfig, RenderConfig, ServeConfig, load_config};
pub use error::{ConfigError, GraphError, LayoutError, ParseError, RenderError, SchemaFlowError};
pub use flow::{FlowDocument, FlowEdge, FlowNode};
pub use graph::{
    Bounds, Direction, NodeKind, Point, ROOT_LABEL, ROOT_NODE_ID, SchemaEdge, SchemaGraph,
    SchemaNode, Side,
};
pub use layout::{LayoutAdapter, LayoutConfig, LayoutEngineKind};
pub use render::render_svg;
#[cfg(feature = "png")]
pub use render::render_png;
pub use schema::{PropertySchema, PropertyType, Schema};
pub use session::{DiagramSession, PreparedSource, SourceChange};

/// Parse schema text and lay it out in one step.
pub fn diagram_from_str(
    text: &str,
    config: &LayoutConfig,
    direction: Direction,
) -> Result<SchemaGraph, SchemaFlowError> {
    let schema = Schema::parse(text)?;
    let graph = SchemaGraph::from_schema(&schema);
    let mut adapter = LayoutAdapter::new(config.clone())?;
    Ok(adapter.layout_graph(&graph, direction)?)
}
