use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Args, Parser, ValueEnum};
use log::{LevelFilter, debug, info};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "server")]
use schemaflow::serve::{ServeArgs, ServeOptions, run_serve};
use schemaflow::{
    AppConfig, Direction, FlowDocument, LayoutAdapter, LayoutConfig, LayoutEngineKind, Schema,
    SchemaGraph, load_config, render_svg,
};

/// Where the schema text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Stdin,
    File(PathBuf),
}

impl Source {
    fn from_arg(arg: Option<&str>) -> Result<Self> {
        let Some(arg) = arg.filter(|arg| *arg != "-") else {
            return Ok(Source::Stdin);
        };
        let path = PathBuf::from(arg);
        if !path.is_file() {
            bail!("schema file '{arg}' not found");
        }
        Ok(Source::File(path))
    }

    fn read(&self) -> Result<String> {
        let text = match self {
            Source::Stdin => {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("failed to read schema from stdin")?;
                buffer
            }
            Source::File(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?,
        };

        if text.trim().is_empty() {
            bail!("{} is empty", self.describe());
        }
        Ok(text)
    }

    fn describe(&self) -> String {
        match self {
            Source::Stdin => "schema on stdin".to_string(),
            Source::File(path) => format!("schema '{}'", path.display()),
        }
    }
}

/// Where the rendered diagram goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sink {
    Stdout,
    File(PathBuf),
}

impl Sink {
    /// `-` is stdout. Without `-o` the diagram lands next to the schema as
    /// `<schema>.<ext>`, or in `diagram.<ext>` for stdin.
    fn resolve(arg: Option<&str>, source: &Source, format: Option<OutputFormat>) -> Result<Self> {
        match arg {
            Some("-") => Ok(Sink::Stdout),
            Some(arg) => {
                let path = PathBuf::from(arg);
                match path.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                        Err(anyhow!("output directory '{}' not found", dir.display()))
                    }
                    _ => Ok(Sink::File(path)),
                }
            }
            None => {
                let ext = format.unwrap_or(OutputFormat::Svg).extension();
                let path = match source {
                    Source::File(schema) => {
                        let mut name = schema.file_name().unwrap_or_default().to_os_string();
                        name.push(format!(".{ext}"));
                        schema.with_file_name(name)
                    }
                    Source::Stdin => PathBuf::from(format!("diagram.{ext}")),
                };
                Ok(Sink::File(path))
            }
        }
    }

    fn write(&self, bytes: &[u8], quiet: bool) -> Result<()> {
        match self {
            Sink::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.flush()?;
            }
            Sink::File(path) => {
                fs::write(path, bytes)
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                if !quiet {
                    println!("Generated diagram -> {}", path.display());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Svg,
    Png,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
        }
    }

    /// An explicit `-e` wins, then the output file extension. Stdout gets SVG.
    fn infer(explicit: Option<Self>, sink: &Sink) -> Result<Self> {
        if let Some(format) = explicit {
            return Ok(format);
        }
        let Sink::File(path) = sink else {
            return Ok(OutputFormat::Svg);
        };
        Self::from_extension(path).ok_or_else(|| {
            anyhow!(
                "cannot tell the format of '{}'; pass -e svg, png or json",
                path.display()
            )
        })
    }

    fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        <OutputFormat as ValueEnum>::from_str(ext, true).ok()
    }
}

/// Layout flags shared by one-shot renders and `--edit`.
#[derive(Debug, Clone, Args)]
struct LayoutFlags {
    /// Layout direction: TB (vertical) or LR (horizontal).
    #[arg(short = 'd', long = "direction")]
    direction: Option<Direction>,

    /// Layout engine: sugiyama (default) or layered.
    #[arg(long = "engine")]
    engine: Option<LayoutEngineKind>,
}

impl LayoutFlags {
    fn apply(&self, mut layout: LayoutConfig) -> LayoutConfig {
        if let Some(direction) = self.direction {
            layout.direction = direction;
        }
        if let Some(engine) = self.engine {
            layout.engine = engine;
        }
        layout
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "schemaflow",
    version,
    about = "Draw the top-level properties of a JSON schema as a node/edge diagram."
)]
pub struct RenderArgs {
    /// Schema file to read, or '-' for stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// File to write, or '-' for stdout. Defaults to '<input>.svg'.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// svg, png or json. Inferred from --output when omitted.
    #[arg(short = 'e', long = "output-format")]
    output_format: Option<OutputFormat>,

    /// Pixel density multiplier for png output.
    #[arg(long = "scale", default_value_t = 2.0)]
    scale: f32,

    #[command(flatten)]
    layout: LayoutFlags,

    /// Open the schema in the browser view instead of writing a file.
    #[arg(
        long = "edit",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["output", "output_format"],
        requires = "input"
    )]
    edit: bool,

    /// Host for the browser view (with --edit).
    #[arg(long = "serve-host", requires = "edit")]
    serve_host: Option<String>,

    /// Port for the browser view (with --edit).
    #[arg(long = "serve-port", requires = "edit")]
    serve_port: Option<u16>,

    /// Canvas color behind the diagram.
    #[arg(short = 'b', long = "background-color")]
    background_color: Option<String>,

    /// TOML settings file; see the [layout], [render] and [serve] sections.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// off, error, warn, info, debug or trace.
    #[arg(long = "log-level", default_value = "warn")]
    log_level: String,

    /// Do not print where the diagram was written.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

/// Arguments after an explicit subcommand, with the program name kept first.
fn without_subcommand(args: &[String]) -> Vec<String> {
    args.iter()
        .take(1)
        .chain(args.iter().skip(2))
        .cloned()
        .collect()
}

#[cfg(feature = "server")]
pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("serve") => {
            let serve_args = ServeArgs::parse_from(without_subcommand(&args));
            init_logging(&serve_args.log_level);
            let config = load_config(serve_args.config.as_deref())?;
            run_serve(serve_options(serve_args, &config), None).await
        }
        Some("render") => render_or_edit(RenderArgs::parse_from(without_subcommand(&args))).await,
        _ => render_or_edit(RenderArgs::parse_from(args)).await,
    }
}

#[cfg(not(feature = "server"))]
pub fn dispatch_sync() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = match args.get(1).map(String::as_str) {
        Some("serve") => bail!("this build has no 'server' feature; 'serve' is unavailable"),
        Some("render") => RenderArgs::parse_from(without_subcommand(&args)),
        _ => RenderArgs::parse_from(args),
    };

    init_logging(&cli.log_level);
    if cli.edit {
        bail!("this build has no 'server' feature; --edit is unavailable");
    }
    let config = load_config(cli.config.as_deref())?;
    render(cli, config)
}

#[cfg(feature = "server")]
async fn render_or_edit(cli: RenderArgs) -> Result<()> {
    init_logging(&cli.log_level);
    let config = load_config(cli.config.as_deref())?;

    if cli.edit {
        edit(cli, config).await
    } else {
        render(cli, config)
    }
}

#[cfg(feature = "server")]
async fn edit(cli: RenderArgs, config: AppConfig) -> Result<()> {
    let Source::File(path) = Source::from_arg(cli.input.as_deref())? else {
        bail!("--edit needs a schema file, not stdin");
    };
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve '{}'", path.display()))?;
    let ui_root = custom_web_dist()?;

    let options = serve_options(
        ServeArgs {
            input: path,
            host: cli.serve_host,
            port: cli.serve_port,
            background_color: cli.background_color,
            direction: cli.layout.direction,
            engine: cli.layout.engine,
            config: cli.config,
            log_level: cli.log_level,
        },
        &config,
    );

    println!("Editing {}", options.input.display());
    if let Some(root) = &ui_root {
        println!("Using web view from {}", root.display());
    }
    println!("Open http://{}:{}", options.host, options.port);

    run_serve(options, ui_root).await
}

#[cfg(feature = "server")]
fn serve_options(args: ServeArgs, config: &AppConfig) -> ServeOptions {
    let flags = LayoutFlags {
        direction: args.direction,
        engine: args.engine,
    };

    ServeOptions {
        input: args.input,
        host: args.host.unwrap_or_else(|| config.serve.host.clone()),
        port: args.port.unwrap_or(config.serve.port),
        background: args
            .background_color
            .unwrap_or_else(|| config.render.background.clone()),
        layout: flags.apply(config.layout.clone()),
    }
}

/// `SCHEMAFLOW_WEB_DIST` replaces the embedded page with a directory that
/// holds its own `index.html`.
#[cfg(feature = "server")]
fn custom_web_dist() -> Result<Option<PathBuf>> {
    let Some(dir) = std::env::var_os("SCHEMAFLOW_WEB_DIST").map(PathBuf::from) else {
        return Ok(None);
    };
    if !dir.join("index.html").is_file() {
        bail!("SCHEMAFLOW_WEB_DIST='{}' has no index.html", dir.display());
    }
    Ok(Some(dir))
}

fn render(cli: RenderArgs, config: AppConfig) -> Result<()> {
    let source = Source::from_arg(cli.input.as_deref())?;
    let sink = Sink::resolve(cli.output.as_deref(), &source, cli.output_format)?;
    let format = OutputFormat::infer(cli.output_format, &sink)?;

    if format == OutputFormat::Png && !(cli.scale.is_finite() && cli.scale > 0.0) {
        bail!("--scale must be a positive number");
    }

    let layout = cli.layout.apply(config.layout);
    let direction = layout.direction;
    let background = cli.background_color.unwrap_or(config.render.background);

    let schema = Schema::parse(&source.read()?)
        .with_context(|| format!("failed to parse {}", source.describe()))?;
    let graph = LayoutAdapter::new(layout)?
        .layout_graph(&SchemaGraph::from_schema(&schema), direction)?;
    debug!(
        "{} nodes laid out {direction}, writing {}",
        graph.nodes.len(),
        format.extension()
    );

    let bytes = match format {
        OutputFormat::Svg => render_svg(&graph, &background)?.into_bytes(),
        OutputFormat::Json => {
            let document = FlowDocument::from_graph(&graph).to_json_pretty()?;
            format!("{document}\n").into_bytes()
        }
        #[cfg(feature = "png")]
        OutputFormat::Png => schemaflow::render_png(&graph, &background, cli.scale)?,
        #[cfg(not(feature = "png"))]
        OutputFormat::Png => bail!("this build has no 'png' feature; png output is unavailable"),
    };

    sink.write(&bytes, cli.quiet)?;
    info!("wrote {} bytes of {}", bytes.len(), format.extension());
    Ok(())
}

fn init_logging(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("unknown log level '{level}', falling back to warn");
        LevelFilter::Warn
    });

    // Only fails when a logger is already installed.
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(filter)
        .try_init();
}
