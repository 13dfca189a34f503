//! Bitstream container for scan-chain FPGA fabrics.
//!
//! Three value types share one currency: the [`FlatBitstream`] logical bit
//! array, and the two external encodings that read and write it —
//! [`TextBitstream`] (`'0'`/`'1'` characters) and [`FourByteBitstream`]
//! (reversed 32-bit hex words with a head/tail checksum pair). Each encoding
//! offers `encode`/`decode` against a device plus `read`/`write` against a
//! file, so the assembler and disassembler never touch file formats
//! directly.

#![warn(missing_docs)]

pub mod checksum;
pub mod error;
pub mod flat;
pub mod fourbyte;
pub mod text;

pub use error::BitstreamError;
pub use flat::FlatBitstream;
pub use fourbyte::FourByteBitstream;
pub use text::TextBitstream;
