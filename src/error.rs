use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn schema text into a [`crate::Schema`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("schema text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("schema does not declare a 'properties' mapping")]
    MissingProperties,
}

impl ParseError {
    /// Line and column of a syntax error, when the JSON itself was malformed.
    pub fn line_column(&self) -> Option<(usize, usize)> {
        match self {
            ParseError::Json(err) => Some((err.line(), err.column())),
            _ => None,
        }
    }
}

/// Broken node/edge invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("edge '{edge}' references unknown node '{node}'")]
    DanglingEdge { edge: String, node: String },

    #[error("duplicate edge id '{0}'")]
    DuplicateEdge(String),

    #[error("node '{node}' only emits connections but edge '{edge}' targets it")]
    IncomingToSource { node: String, edge: String },

    #[error("node '{node}' only receives connections but edge '{edge}' leaves it")]
    OutgoingFromSink { node: String, edge: String },
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("invalid layout configuration: {0}")]
    InvalidConfig(String),

    #[error("layout engine failed: {0}")]
    Engine(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("diagram does not contain any nodes")]
    EmptyDiagram,

    #[error("failed to format svg output")]
    Format(#[from] std::fmt::Error),

    #[error("scale must be a positive finite number, got {0}")]
    InvalidScale(f32),

    #[error("failed to rasterize diagram: {0}")]
    Raster(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read configuration file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML configuration '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Any failure of the parse, build, layout and render pipeline.
#[derive(Debug, Error)]
pub enum SchemaFlowError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl SchemaFlowError {
    pub fn is_parse(&self) -> bool {
        matches!(self, SchemaFlowError::Parse(_))
    }
}
