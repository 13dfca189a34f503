//! Device database model for scan-chain FPGA fabrics.
//!
//! A database describes one device: how its flat configuration bit array is
//! partitioned into scan-chain regions, which tile and routing blocks sit at
//! which grid locations, and which configuration bits (segbits) each block
//! feature programs. The FASM assembler and disassembler consume this model;
//! the database builder produces it from a fabric-dependent XML dump.
//!
//! # Layout on disk
//!
//! - `device.json` — configuration type and length, region list, tile and
//!   routing block instances, optional default bitstream reference
//! - `segbits_<kind>.db` / `segbits_<kind>_<variant>.db` — per-block-kind
//!   feature tables
//!
//! See [`Device::load`] for the cross-validation performed at load time.

#![warn(missing_docs)]

pub mod bit;
pub mod device;
pub mod error;
pub mod segbits;

pub use bit::{Bit, SegbitPattern};
pub use device::{Block, DefaultBitstream, Device, Format, Region};
pub use error::DbError;
pub use segbits::FeatureTable;
