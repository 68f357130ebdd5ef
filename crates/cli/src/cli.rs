//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{LocationKind, Slot};
use std::path::PathBuf;

/// Wearable Hub - bind body-worn IMU devices and record collection sessions
#[derive(Parser, Debug)]
#[command(
    name = "wearable-hub",
    author,
    version,
    about = "Wearable multi-device IMU ingestion hub",
    long_about = "Binds up to five body-worn sensor devices to anatomical slots, \n\
                  streams their IMU batches to a fusion consumer and records them \n\
                  to per-device-class CSV files."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "WEARABLE_HUB_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "WEARABLE_HUB_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated collection session
    Simulate(SimulateArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "hub.toml", env = "WEARABLE_HUB_CONFIG")]
    pub config: PathBuf,

    /// Slots to populate; the first gets the (mock) watch
    #[arg(long, value_delimiter = ',', default_value = "chest")]
    pub slots: Vec<Slot>,

    /// Collection duration in seconds
    #[arg(long, default_value = "5", env = "WEARABLE_HUB_DURATION")]
    pub duration_secs: u64,

    /// Samples per streamed batch
    #[arg(long, default_value = "25")]
    pub batch_size: usize,

    /// Sample rate of every simulated stream (Hz)
    #[arg(long, default_value = "100")]
    pub frequency_hz: f64,

    /// Activity label sent with the start context
    #[arg(long, default_value = "walking")]
    pub activity: String,

    /// Where the session takes place
    #[arg(long, value_enum, default_value = "indoor")]
    pub location: Location,

    /// Override persistence output directory from configuration
    #[arg(long, env = "WEARABLE_HUB_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Disable CSV persistence
    #[arg(long)]
    pub no_persist: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "WEARABLE_HUB_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "hub.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "hub.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Collection location
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum Location {
    #[default]
    Indoor,
    Outdoor,
}

impl From<Location> for LocationKind {
    fn from(location: Location) -> Self {
        match location {
            Location::Indoor => LocationKind::Indoor,
            Location::Outdoor => LocationKind::Outdoor,
        }
    }
}
