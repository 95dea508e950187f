use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::ServiceExt;
use tower::service_fn;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::error::SchemaFlowError;
use crate::flow::FlowDocument;
use crate::graph::{Bounds, Direction, Point};
use crate::layout::{LayoutAdapter, LayoutConfig, LayoutEngineKind};
use crate::render::render_svg;
use crate::session::{DiagramSession, SourceChange};

const INDEX_HTML: &str = include_str!("../web/index.html");

/// Arguments for running the schemaflow web view.
#[derive(Debug, Clone, Parser)]
#[command(name = "schemaflow serve", about = "Serve the interactive schema diagram view.")]
pub struct ServeArgs {
    /// Path to the schema file that should be served.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Address to bind the HTTP server to (defaults to the configured host).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (defaults to the configured port).
    #[arg(long)]
    pub port: Option<u16>,

    /// Background color for rendered SVG previews.
    #[arg(long = "background-color")]
    pub background_color: Option<String>,

    /// Initial layout direction: TB (vertical) or LR (horizontal).
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<Direction>,

    /// Layout engine: layered or sugiyama.
    #[arg(long = "engine")]
    pub engine: Option<LayoutEngineKind>,

    /// Path to configuration file (TOML).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub input: PathBuf,
    pub host: String,
    pub port: u16,
    pub background: String,
    pub layout: LayoutConfig,
}

pub struct ServeState {
    source_path: PathBuf,
    background: String,
    session: RwLock<DiagramSession>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagramPayload {
    source_path: String,
    background: String,
    direction: Direction,
    revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(flatten)]
    document: FlowDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    fit: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SourcePayload {
    source: String,
}

#[derive(Debug, Deserialize)]
struct LayoutRequest {
    direction: Direction,
}

impl ServeState {
    /// Read the schema file and build the first diagram. A file that does not
    /// parse still starts the server, showing an empty diagram and the error.
    pub async fn load(
        source_path: PathBuf,
        background: String,
        layout: LayoutConfig,
    ) -> Result<Self> {
        let adapter = LayoutAdapter::new(layout)?;
        let mut session = DiagramSession::new(adapter);

        let contents = tokio::fs::read_to_string(&source_path)
            .await
            .with_context(|| format!("failed to read '{}'", source_path.display()))?;
        if let Err(err) = session.set_source(&contents) {
            warn!("'{}' does not contain a usable schema: {err}", source_path.display());
        }

        Ok(Self {
            source_path,
            background,
            session: RwLock::new(session),
        })
    }

    /// Pick up edits made to the file outside the view. Read, compare and
    /// rebuild happen under one write lock so a concurrent PUT is not undone.
    async fn refresh_from_disk(&self) -> Result<()> {
        let mut session = self.session.write().await;
        let contents = tokio::fs::read_to_string(&self.source_path)
            .await
            .with_context(|| format!("failed to read '{}'", self.source_path.display()))?;

        if session.is_current(&contents) {
            return Ok(());
        }

        // Parse failures are kept on the session and reported in the payload.
        if let Ok(SourceChange::Rebuilt) = session.set_source(&contents) {
            info!(
                "reloaded '{}' (revision {})",
                self.source_path.display(),
                session.revision()
            );
        }
        Ok(())
    }

    async fn payload(&self, fit: bool) -> DiagramPayload {
        let session = self.session.read().await;
        DiagramPayload {
            source_path: self.source_path.display().to_string(),
            background: self.background.clone(),
            direction: session.direction(),
            revision: session.revision(),
            title: session.title().map(str::to_string),
            document: FlowDocument::from_graph(session.graph()),
            bounds: session.bounds(),
            error: session.last_error().map(str::to_string),
            fit,
        }
    }

    async fn replace_source(&self, contents: &str) -> Result<(), ReplaceError> {
        let mut session = self.session.write().await;
        let prepared = session.prepare(contents).map_err(ReplaceError::Rejected)?;

        tokio::fs::write(&self.source_path, prepared.text())
            .await
            .with_context(|| format!("failed to write '{}'", self.source_path.display()))
            .map_err(ReplaceError::Io)?;

        session.commit(prepared);
        Ok(())
    }
}

enum ReplaceError {
    Rejected(SchemaFlowError),
    Io(anyhow::Error),
}

pub fn router(state: Arc<ServeState>, ui_root: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/diagram", get(get_diagram))
        .route("/api/diagram/svg", get(get_svg))
        .route("/api/diagram/source", get(get_source).put(put_source))
        .route("/api/diagram/layout", post(post_layout))
        .route("/api/diagram/nodes/:id/position", put(put_node_position))
        .with_state(state);

    match ui_root {
        Some(root) => {
            let static_dir = ServeDir::new(root.clone())
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(root.join("index.html")));

            let static_service = service_fn(move |req| {
                let svc = static_dir.clone();
                async move {
                    match svc.oneshot(req).await {
                        Ok(response) => Ok(response.map(axum::body::Body::new)),
                        Err(error) => {
                            let message = format!("Static file error: {error}");
                            Ok((StatusCode::INTERNAL_SERVER_ERROR, message).into_response())
                        }
                    }
                }
            });

            app = app.fallback_service(static_service);
        }
        None => {
            app = app.route("/", get(get_index));
        }
    }

    app.layer(CorsLayer::permissive())
}

pub async fn run_serve(options: ServeOptions, ui_root: Option<PathBuf>) -> Result<()> {
    let state = Arc::new(
        ServeState::load(
            options.input.clone(),
            options.background.clone(),
            options.layout.clone(),
        )
        .await?,
    );
    let app = router(state, ui_root);

    let addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    info!("serving '{}'", options.input.display());
    println!("schemaflow listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn get_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn get_diagram(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<DiagramPayload>, (StatusCode, String)> {
    state.refresh_from_disk().await.map_err(internal_error)?;
    Ok(Json(state.payload(false).await))
}

async fn get_svg(State(state): State<Arc<ServeState>>) -> Result<Response, (StatusCode, String)> {
    let svg = {
        let session = state.session.read().await;
        render_svg(session.graph(), &state.background)
            .map_err(|err| internal_error(err.into()))?
    };

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn get_source(State(state): State<Arc<ServeState>>) -> Json<SourcePayload> {
    let source = state.session.read().await.source().to_string();
    Json(SourcePayload { source })
}

async fn put_source(
    State(state): State<Arc<ServeState>>,
    Json(payload): Json<SourcePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.replace_source(&payload.source).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(ReplaceError::Rejected(err)) if err.is_parse() => {
            Err((StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(ReplaceError::Rejected(err)) => Err(internal_error(err.into())),
        Err(ReplaceError::Io(err)) => Err(internal_error(err)),
    }
}

async fn post_layout(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<LayoutRequest>,
) -> Result<Json<DiagramPayload>, (StatusCode, String)> {
    state
        .session
        .write()
        .await
        .relayout(request.direction)
        .map_err(|err| internal_error(err.into()))?;
    Ok(Json(state.payload(true).await))
}

async fn put_node_position(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
    Json(position): Json<Point>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !position.x.is_finite() || !position.y.is_finite() {
        return Err((
            StatusCode::BAD_REQUEST,
            "position must be finite".to_string(),
        ));
    }

    if state.session.write().await.move_node(&node_id, position) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("node '{node_id}' not found")))
    }
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
