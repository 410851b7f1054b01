//! Starfield CLI - crop, analyze and visualize from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use starfield::{Config, MergePolicy, Session, TileSize, report};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Mean position of the merged detections
    Centroid,
    /// Keep the detection with the highest flux
    Brightest,
}

impl From<PolicyArg> for MergePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Centroid => MergePolicy::Centroid,
            PolicyArg::Brightest => MergePolicy::Brightest,
        }
    }
}

#[derive(Parser)]
#[command(name = "starfield")]
#[command(
    about = "Split an image into tiles, detect point sources and draw them",
    long_about = None
)]
struct Cli {
    /// YAML config file; command-line options override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory for rolling log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Overrides {
    /// Tile width in pixels
    #[arg(long, global = true)]
    tile_width: Option<u32>,

    /// Tile height in pixels
    #[arg(long, global = true)]
    tile_height: Option<u32>,

    /// Tile file extension (png, tiff, ...)
    #[arg(long, global = true)]
    tile_extension: Option<String>,

    /// Detection radius in pixels
    #[arg(long, global = true)]
    radius: Option<f32>,

    /// Distance below which detections on neighbouring tiles are merged
    #[arg(long, global = true)]
    tolerance: Option<f64>,

    /// How merged detections are combined
    #[arg(long, global = true, value_enum)]
    merge_policy: Option<PolicyArg>,

    /// Maximum concurrent tile workers (0 = all CPUs)
    #[arg(long, global = true)]
    max_workers: Option<usize>,

    /// Overlay marker diameter in pixels
    #[arg(long, global = true)]
    marker_size: Option<u32>,

    /// Report file path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Overlay image path
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Split a source image into tiles named by their offset
    Crop { source: PathBuf, tile_dir: PathBuf },
    /// Detect objects in every tile and write the report
    Analyze { tile_dir: PathBuf },
    /// Draw the detections from a report over the source image
    Visualize { source: PathBuf },
    /// Crop, analyze and visualize in one go
    Run { source: PathBuf, tile_dir: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = match common::log_setup::setup_logging(&cli.log_level, &cli.log_dir) {
        Ok(()) => true,
        Err(err) => {
            eprintln!("Warning: logging disabled: {err}");
            false
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // The console layer already sends errors to stderr.
            if logging {
                tracing::error!("Command failed: {err:#}");
            } else {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), &cli.overrides)?;
    let mut session = Session::new(config);

    match cli.command {
        Command::Crop { source, tile_dir } => {
            crop(&mut session, &source, &tile_dir)?;
        }
        Command::Analyze { tile_dir } => {
            analyze(&mut session, &tile_dir)?;
        }
        Command::Visualize { source } => {
            let report_path = session.config().report_path.clone();
            let detections = report::read(&report_path)
                .with_context(|| format!("reading detections from {}", report_path.display()))?;
            session.set_detections(detections);
            visualize(&session, &source)?;
        }
        Command::Run { source, tile_dir } => {
            crop(&mut session, &source, &tile_dir)?;
            analyze(&mut session, &tile_dir)?;
            visualize(&session, &source)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if overrides.tile_width.is_some() || overrides.tile_height.is_some() {
        config.tile_size = TileSize::new(
            overrides.tile_width.unwrap_or(config.tile_size.width),
            overrides.tile_height.unwrap_or(config.tile_size.height),
        );
    }
    if let Some(extension) = &overrides.tile_extension {
        config.tile_extension = extension.clone();
    }
    if let Some(radius) = overrides.radius {
        config.detection_radius = radius;
    }
    if let Some(tolerance) = overrides.tolerance {
        config.boundary_tolerance = tolerance;
    }
    if let Some(policy) = overrides.merge_policy {
        config.merge_policy = policy.into();
    }
    if let Some(max_workers) = overrides.max_workers {
        config.max_workers = max_workers;
    }
    if let Some(marker_size) = overrides.marker_size {
        config.marker_size = marker_size;
    }
    if let Some(report) = &overrides.report {
        config.report_path = report.clone();
    }
    if let Some(output) = &overrides.output {
        config.overlay_path = output.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn crop(session: &mut Session, source: &Path, tile_dir: &Path) -> Result<()> {
    session
        .request_crop(Some(source), Some(tile_dir))
        .with_context(|| format!("cropping {} into {}", source.display(), tile_dir.display()))?;
    println!("Tiles written to {}", tile_dir.display());
    Ok(())
}

fn analyze(session: &mut Session, tile_dir: &Path) -> Result<()> {
    let summary = session
        .request_analyze(Some(tile_dir))
        .with_context(|| format!("analyzing tiles in {}", tile_dir.display()))?;

    println!(
        "{} objects ({} before merging) in {} tiles, report: {}",
        summary.detections,
        summary.raw_detections,
        summary.tile_count,
        summary.report_path.display()
    );
    for failure in &summary.failures {
        println!("  skipped {failure}");
    }
    Ok(())
}

fn visualize(session: &Session, source: &Path) -> Result<()> {
    let output = session
        .request_visualize(Some(source))
        .with_context(|| format!("rendering overlay for {}", source.display()))?;
    println!("Overlay written to {}", output.display());
    Ok(())
}
