//! Database builder for scan-chain FPGA fabrics.
//!
//! Consumes the fabric-dependent bitstream XML dump produced at
//! fabric-generation time and emits the on-disk database the codec loads:
//! `device.json` plus one segbits file per discovered block-kind pattern.
//! The interesting part is segbit-set discovery — finding the repeating
//! per-bit patterns across grid locations so thousands of per-bit entries
//! collapse into one shared table per block kind.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod xml;

pub use builder::build_database;
pub use error::BuildError;
pub use xml::{parse_fabric_xml, FabricBit};
