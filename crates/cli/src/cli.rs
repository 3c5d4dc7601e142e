//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::SpeedUnit;
use std::path::PathBuf;

/// Dashtrack - dashcam telemetry overlays and moving maps
#[derive(Parser, Debug)]
#[command(
    name = "dashtrack",
    author,
    version,
    about = "Dashcam telemetry overlay and map-track generator",
    long_about = "Extracts the GPS/accelerometer telemetry embedded in dashcam MPEG-TS segments,\n\
                  stitches it into one track per recording session, and renders a tachometer\n\
                  overlay and a moving-map sequence frame-aligned to the video, plus a timing\n\
                  manifest and a compositing plan for the final merge."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DASHTRACK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "DASHTRACK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert recording sessions into overlay and map frame sequences
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// List discovered sessions and their segments
    Info(InfoArgs),

    /// Export the stitched telemetry of every session as GPX, no rendering
    ExportGpx(ExportGpxArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Input folders or .ts segment files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path to configuration file (TOML or JSON), defaults apply when omitted
    #[arg(short, long, env = "DASHTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long, env = "DASHTRACK_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override display timezone (IANA name)
    #[arg(long, env = "DASHTRACK_TIMEZONE")]
    pub timezone: Option<String>,

    /// Override display speed unit
    #[arg(long, value_enum, env = "DASHTRACK_SPEED_UNIT")]
    pub speed_unit: Option<SpeedUnitArg>,

    /// Skip the overlay sequence
    #[arg(long)]
    pub no_overlay: bool,

    /// Skip the map-track sequence
    #[arg(long)]
    pub no_map: bool,

    /// Override number of sessions processed in parallel
    #[arg(long, env = "DASHTRACK_WORKERS")]
    pub workers: Option<usize>,

    /// Use the deterministic offline geo service (no network access)
    #[arg(long, env = "DASHTRACK_OFFLINE")]
    pub offline: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DASHTRACK_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and list sessions without converting
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "dashtrack.toml", env = "DASHTRACK_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Input folders or .ts segment files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, env = "DASHTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Extract and parse telemetry to show per-session statistics
    #[arg(long)]
    pub stats: bool,
}

/// Arguments for the `export-gpx` command
#[derive(Parser, Debug)]
pub struct ExportGpxArgs {
    /// Input folders or .ts segment files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, env = "DASHTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long, env = "DASHTRACK_OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Display speed unit
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedUnitArg {
    #[value(name = "km/h", alias = "kmh")]
    Kmh,
    #[value(name = "mph")]
    Mph,
    #[value(name = "m/s", alias = "ms")]
    Ms,
    #[value(name = "kn")]
    Kn,
}

impl From<SpeedUnitArg> for SpeedUnit {
    fn from(unit: SpeedUnitArg) -> Self {
        match unit {
            SpeedUnitArg::Kmh => Self::KilometersPerHour,
            SpeedUnitArg::Mph => Self::MilesPerHour,
            SpeedUnitArg::Ms => Self::MetersPerSecond,
            SpeedUnitArg::Kn => Self::Knots,
        }
    }
}
