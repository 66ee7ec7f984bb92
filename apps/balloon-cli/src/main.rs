//! Headless balloon annotation
//!
//! Drives the annotation engine without a UI:
//!
//! - `balloon inspect <pdf>` prints page count, page size and the default
//!   orientation of page 1.
//! - `balloon annotate <pdf> --script <json>` replays a recorded session,
//!   waits for every text resolution, prints the balloon records as JSON
//!   and optionally writes the report and the annotated PDF.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use balloon_backend::BackendClient;
use balloon_core::config::EngineConfig;
use balloon_core::{
    AnnotationEngine, Artifact, DocumentHandle, EngineEvent, Orientation, PageGeometryRenderer,
    PageSpans, RasterSurface, SpanIndexResolver, TextResolver,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod script;

use script::Script;

#[derive(Parser, Debug)]
#[command(name = "balloon")]
#[command(about = "Place numbered balloons on PDF drawings and export the mapping")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the extraction/report service (overrides the config)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page 1 geometry
    Inspect {
        pdf: PathBuf,
    },
    /// Replay a session script against a drawing
    Annotate(AnnotateArgs),
}

#[derive(clap::Args, Debug)]
struct AnnotateArgs {
    pdf: PathBuf,

    /// Session script (JSON)
    #[arg(long)]
    script: PathBuf,

    /// Write the filled report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the annotated PDF here (needs --surface)
    #[arg(long, requires = "surface")]
    annotated: Option<PathBuf>,

    /// PNG raster of page 1 as rendered at zoom 1.0
    #[arg(long)]
    surface: Option<PathBuf>,

    /// Resolve text offline from a span set (JSON) instead of the service
    #[arg(long)]
    spans: Option<PathBuf>,
}

#[derive(Serialize)]
struct Inspection<'a> {
    name: &'a str,
    pages: u32,
    width: f64,
    height: f64,
    orientation: Orientation,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.json);

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(base_url) = &args.backend {
        config.backend.base_url = base_url.clone();
    }
    config.validate()?;

    match args.command {
        Command::Inspect { pdf } => inspect(&pdf),
        Command::Annotate(annotate_args) => annotate(config, annotate_args).await,
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(log_level.into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the command output; logs go to stderr
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let document = DocumentHandle::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let size = document.page_size();
    let report = Inspection {
        name: document.name(),
        pages: document.page_count(),
        width: size.width,
        height: size.height,
        orientation: Orientation::of_size(size.width, size.height),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn annotate(config: EngineConfig, args: AnnotateArgs) -> anyhow::Result<()> {
    let document = DocumentHandle::open(&args.pdf)
        .with_context(|| format!("Failed to open {}", args.pdf.display()))?;
    let script = Script::from_file(&args.script)?;

    let mut renderer = PageGeometryRenderer::new(config.view.render_scale);
    if let Some(path) = &args.surface {
        let png = std::fs::read(path)
            .with_context(|| format!("Failed to read surface: {}", path.display()))?;
        renderer = renderer.with_surface(RasterSurface::from_png(&png)?);
    }

    let backend = Arc::new(BackendClient::new(&config.backend)?);
    let resolver: Arc<dyn TextResolver> = match &args.spans {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read spans: {}", path.display()))?;
            info!(path = %path.display(), "Resolving text from local spans");
            Arc::new(SpanIndexResolver::new(PageSpans::from_json(&json)?))
        }
        None => {
            info!(backend = backend.base_url(), "Resolving text through the service");
            backend.clone()
        }
    };

    let mut engine = AnnotationEngine::new(&config, Arc::new(renderer), resolver, backend)?;
    engine.load_document(document)?;
    script::replay(&mut engine, &script)?;

    let events = engine.settle().await;
    let failed = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::ResolutionFailed { .. }))
        .count();
    if failed > 0 {
        warn!(failed, "Some balloons could not be resolved");
    }
    println!("{}", serde_json::to_string_pretty(&engine.records())?);

    if let Some(path) = &args.report {
        let artifact = engine.export_report().await.context("Report export failed")?;
        save(artifact, path)?;
    }
    if let Some(path) = &args.annotated {
        let artifact = engine.export_raster().context("Annotated PDF export failed")?;
        save(artifact, path)?;
    }
    Ok(())
}

/// Write under the requested path; a directory keeps the artifact's own name
fn save(mut artifact: Artifact, path: &Path) -> anyhow::Result<()> {
    let dir = if path.is_dir() {
        path.to_path_buf()
    } else {
        if let Some(name) = path.file_name() {
            artifact.filename = name.to_string_lossy().into_owned();
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    };
    let written = artifact
        .write_to(&dir)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %written.display(), bytes = artifact.bytes.len(), mime = %artifact.mime_type, "Export written");
    Ok(())
}
