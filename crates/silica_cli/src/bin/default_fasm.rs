//! `silica-default-fasm` — writes a FASM file naming every tile instance
//! of the given segbit features, for default bitstream preparation.

#![warn(missing_docs)]

use clap::Parser;
use silica_db::Device;
use silica_fasm::default_fasm::make_default_fasm;
use std::path::PathBuf;
use std::process;

/// Generate a default FASM file from segbit feature names.
#[derive(Parser, Debug)]
#[command(name = "silica-default-fasm", version, about)]
struct Cli {
    /// Output FASM file.
    output: PathBuf,

    /// Device database root directory.
    #[arg(long)]
    db_root: PathBuf,

    /// Feature name to instantiate in every tile that has it (repeatable).
    #[arg(long = "feature", required = true)]
    features: Vec<String>,

    /// Logging verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Warning)]
    log_level: LogLevel,
}

/// Logging verbosity names matching the Python logging levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum LogLevel {
    /// Everything.
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

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level.to_filter())
        .init();

    let device = match Device::load(&cli.db_root) {
        Ok(device) => device,
        Err(e) => {
            log::error!("{e}");
            process::exit(255);
        }
    };

    let fasm = make_default_fasm(&device, &cli.features);
    if let Err(e) = std::fs::write(&cli.output, fasm) {
        log::error!("failed to write {}: {e}", cli.output.display());
        process::exit(255);
    }
}
