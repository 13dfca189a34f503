//! FASM ↔ configuration-bit conversion for scan-chain FPGA fabrics.
//!
//! This crate turns FASM feature annotations into bit mutations on a flat
//! configuration array and back:
//!
//! - [`parse::parse_fasm`] — FASM text to [`SetFeature`] records
//! - [`Assembler`] — records to bits, with conflict detection and
//!   unknown-feature accumulation
//! - [`disassemble::disassemble`] — bits to canonical records plus the
//!   force-bit list
//! - [`default_fasm::make_default_fasm`] — database-preparation helper
//!
//! The device model comes from [`silica_db`]; the flat bit array and the
//! external encodings come from [`silica_bitstream`].

#![warn(missing_docs)]

pub mod assemble;
pub mod default_fasm;
pub mod disassemble;
pub mod error;
pub mod parse;
pub mod record;
pub mod resolve;

pub use assemble::Assembler;
pub use disassemble::{disassemble, Disassembly};
pub use error::FasmError;
pub use parse::parse_fasm;
pub use record::{render_fasm, SetFeature};
pub use resolve::FeatureResolver;
