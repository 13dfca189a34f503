//! `silica-dbgen` — builds a device database from a fabric XML dump.

use clap::Parser;
use silica_dbgen::{build_database, parse_fabric_xml, BuildError};
use std::path::PathBuf;
use std::process;

/// Build a silica device database from a fabric-dependent bitstream XML dump.
#[derive(Parser, Debug)]
#[command(name = "silica-dbgen", version, about)]
struct Cli {
    /// The fabric bitstream XML dump.
    fabric_xml: PathBuf,

    /// Output directory for device.json and the segbits files.
    output: PathBuf,

    /// Logging verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Warning)]
    log_level: LogLevel,
}

/// Logging verbosity names matching the Python logging levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum LogLevel {
    /// Everything, including per-bit classification.
    #[value(name = "DEBUG")]
    Debug,
    /// Progress messages.
    #[value(name = "INFO")]
    Info,
    /// Tolerated irregularities only.
    #[value(name = "WARNING")]
    Warning,
    /// Failures only.
    #[value(name = "ERROR")]
    Error,
    /// Fatal failures only.
    #[value(name = "CRITICAL")]
    Critical,
}

impl LogLevel {
    fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => log::LevelFilter::Error,
        }
    }
}

fn run(cli: &Cli) -> Result<(), BuildError> {
    let content = std::fs::read_to_string(&cli.fabric_xml)?;
    let bits = parse_fabric_xml(&content)?;
    log::info!("classified {} fabric bits", bits.len());

    let device = build_database(&bits)?;
    log::info!(
        "built database: {} regions, {} tiles, {} feature tables",
        device.region_count(),
        device.tiles.len(),
        device.features.len()
    );

    device.save(&cli.output)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level.to_filter())
        .init();

    if let Err(e) = run(&cli) {
        log::error!("{e}");
        process::exit(1);
    }
}
