//! Top-level conversion flows.
//!
//! The driver ties the pieces together: it picks the conversion direction
//! from flags and file extensions, loads the database, runs the assembler
//! or disassembler, and applies the checksum policy. All typed errors from
//! the lower layers surface here and map to a fatal exit in `main`.

use silica_bitstream::{BitstreamError, FlatBitstream, FourByteBitstream, TextBitstream};
use silica_db::{DbError, Device, Format};
use silica_fasm::{disassemble, parse_fasm, render_fasm, Assembler, FasmError};
use std::path::{Path, PathBuf};

/// Conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// FASM text to external bitstream.
    Assemble,
    /// External bitstream to FASM text plus force-bit list.
    Disassemble,
}

/// Errors surfaced by a conversion run.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Database loading or validation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// FASM parsing or assembly failed.
    #[error(transparent)]
    Fasm(#[from] FasmError),

    /// Bitstream reading, writing, or checksum validation failed.
    #[error(transparent)]
    Bitstream(#[from] BitstreamError),

    /// A conversion file could not be accessed.
    #[error("failed to access file: {0}")]
    Io(#[from] std::io::Error),

    /// Neither flags nor file extensions determine the direction.
    #[error("cannot deduce conversion direction from '{input}' and '{output}'; use -a or -d")]
    UnknownConversion {
        /// The input path as given.
        input: String,
        /// The output path as given.
        output: String,
    },

    /// The FASM input referenced features the database does not know.
    #[error("{0} unknown feature(s) in the FASM input")]
    UnknownFeatures(usize),
}

/// Everything one conversion run needs.
#[derive(Debug, Clone)]
pub struct Options {
    /// Input file.
    pub input: PathBuf,
    /// Output file.
    pub output: PathBuf,
    /// Encoding of the binary side.
    pub format: Format,
    /// Explicit direction override, if any.
    pub direction: Option<Direction>,
    /// Database root directory.
    pub db_root: PathBuf,
    /// Emit zero-valued features in FASM output.
    pub unset_features: bool,
    /// Skip the default bitstream overlay entirely.
    pub no_default_bitstream: bool,
    /// Default bitstream path override.
    pub default_bitstream: Option<PathBuf>,
    /// Default bitstream format override.
    pub default_bitstream_format: Option<Format>,
    /// Neither read, write, nor compute checksum words.
    pub no_crc: bool,
    /// Demote checksum mismatches from fatal to warning.
    pub no_check_crc: bool,
}

/// Runs one conversion.
pub fn run(opts: &Options) -> Result<(), DriverError> {
    let device = Device::load(&opts.db_root)?;
    match pick_direction(opts.direction, &opts.input, &opts.output)? {
        Direction::Assemble => assemble_flow(opts, &device),
        Direction::Disassemble => disassemble_flow(opts, &device),
    }
}

/// Resolves the conversion direction: an explicit flag wins, then the
/// input extension, then the output extension.
pub fn pick_direction(
    explicit: Option<Direction>,
    input: &Path,
    output: &Path,
) -> Result<Direction, DriverError> {
    if let Some(direction) = explicit {
        return Ok(direction);
    }

    match extension_of(input).as_deref() {
        Some("fasm") => return Ok(Direction::Assemble),
        Some("bit" | "bin") => return Ok(Direction::Disassemble),
        _ => {}
    }
    match extension_of(output).as_deref() {
        Some("fasm") => return Ok(Direction::Disassemble),
        Some("bit" | "bin") => return Ok(Direction::Assemble),
        _ => {}
    }
    Err(DriverError::UnknownConversion {
        input: input.display().to_string(),
        output: output.display().to_string(),
    })
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// FASM → bitstream.
fn assemble_flow(opts: &Options, device: &Device) -> Result<(), DriverError> {
    let seed = load_seed(opts, device)?;
    let content = std::fs::read_to_string(&opts.input)?;
    let records = parse_fasm(&content)?;

    let mut assembler = Assembler::new(device, seed);
    let unknown = assembler.assemble(&records)?;
    if !unknown.is_empty() {
        for record in &unknown {
            log::error!("unknown feature '{}'", record.feature);
        }
        return Err(DriverError::UnknownFeatures(unknown.len()));
    }
    let bits = assembler.into_bits();

    match opts.format {
        Format::Text => TextBitstream::encode(&bits, device).write(&opts.output)?,
        Format::FourByte => {
            let mut encoded = FourByteBitstream::encode(&bits, device)?;
            if !opts.no_crc {
                encoded.compute_checksums(device);
            }
            encoded.write(&opts.output)?;
        }
    }
    Ok(())
}

/// Bitstream → FASM plus force-bit list.
fn disassemble_flow(opts: &Options, device: &Device) -> Result<(), DriverError> {
    let flat = read_external(&opts.input, opts.format, device, opts)?;
    let result = disassemble(device, &flat, opts.unset_features);

    std::fs::write(&opts.output, render_fasm(&result.records))?;
    let force_path = opts.output.with_extension("force");
    std::fs::write(&force_path, result.render_force_bits())?;
    log::info!(
        "disassembled {} feature(s), {} force bit(s)",
        result.records.len(),
        result.force_bits.len()
    );
    Ok(())
}

/// Loads and decodes the default bitstream seed, if the policy asks for one.
fn load_seed(opts: &Options, device: &Device) -> Result<Option<FlatBitstream>, DriverError> {
    if opts.no_default_bitstream {
        return Ok(None);
    }
    let (path, format) = match (&opts.default_bitstream, &device.default_bitstream) {
        (Some(path), _) => (
            path.clone(),
            opts.default_bitstream_format.unwrap_or(Format::FourByte),
        ),
        (None, Some(reference)) => {
            let path = device
                .default_bitstream_path()
                .unwrap_or_else(|| PathBuf::from(&reference.file));
            (path, opts.default_bitstream_format.unwrap_or(reference.format))
        }
        (None, None) => return Ok(None),
    };
    log::info!("overlaying default bitstream {}", path.display());
    Ok(Some(read_external(&path, format, device, opts)?))
}

/// Reads and decodes an external bitstream, applying the checksum policy.
fn read_external(
    path: &Path,
    format: Format,
    device: &Device,
    opts: &Options,
) -> Result<FlatBitstream, DriverError> {
    match format {
        Format::Text => Ok(TextBitstream::read(path)?.decode(device)),
        Format::FourByte => {
            let encoded = FourByteBitstream::read(path, !opts.no_crc)?;
            if !opts.no_crc {
                let stored = encoded.checksums().unwrap_or((0, 0));
                let computed = encoded.computed_checksums(device);
                if stored != computed {
                    let mismatch = BitstreamError::CrcMismatch {
                        stored_head: stored.0,
                        stored_tail: stored.1,
                        computed_head: computed.0,
                        computed_tail: computed.1,
                    };
                    if opts.no_check_crc {
                        log::warn!("{mismatch}");
                    } else {
                        return Err(mismatch.into());
                    }
                }
            }
            Ok(encoded.decode(device))
        }
    }
}
