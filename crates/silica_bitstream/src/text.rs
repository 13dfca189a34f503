//! The `txt` external encoding: a stream of `'0'`/`'1'` characters.
//!
//! On encode every region is padded to `Lmax`, the length of the longest
//! region, so region `r`'s bits occupy positions `[r*Lmax, r*Lmax+length)`
//! of the character stream with zero padding behind them. Whitespace is
//! ignored on read. Decoding is deliberately best-effort about stream
//! length: a short input is logged as an error and decoded as far as it
//! goes, a long input is logged as a warning and the excess dropped.

use crate::error::BitstreamError;
use crate::flat::FlatBitstream;
use bit_vec::BitVec;
use silica_db::Device;
use std::path::Path;

/// A bitstream in the padded `txt` external representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBitstream {
    bits: BitVec,
}

impl TextBitstream {
    /// Encodes a flat bit array into the padded external representation.
    pub fn encode(flat: &FlatBitstream, device: &Device) -> Self {
        let slot = device.max_region_length();
        let mut bits = BitVec::from_elem((device.region_count() * slot) as usize, false);

        for region in device.regions.values() {
            for i in 0..region.length {
                let position = (region.id * slot + i) as usize;
                bits.set(position, flat.get(region.offset + i));
            }
        }
        Self { bits }
    }

    /// Decodes the external representation back into a flat bit array.
    pub fn decode(&self, device: &Device) -> FlatBitstream {
        let slot = device.max_region_length();
        let expected = (device.region_count() * slot) as usize;
        if self.bits.len() < expected {
            log::error!(
                "text bitstream has {} bits, expected {expected}; decoding what is present",
                self.bits.len()
            );
        } else if self.bits.len() > expected {
            log::warn!(
                "text bitstream has {} bits, expected {expected}; ignoring the excess",
                self.bits.len()
            );
        }

        let mut flat = FlatBitstream::new(device.bitstream_size);
        for region in device.regions.values() {
            for i in 0..region.length {
                let position = (region.id * slot + i) as usize;
                if let Some(value) = self.bits.get(position) {
                    flat.set(region.offset + i, value);
                }
            }
        }
        flat
    }

    /// Parses the character stream of a `txt` file.
    ///
    /// # Errors
    ///
    /// [`BitstreamError::Parse`] on any character other than `'0'`, `'1'`,
    /// or whitespace.
    pub fn parse(content: &str) -> Result<Self, BitstreamError> {
        let mut bits = BitVec::new();
        for ch in content.chars() {
            match ch {
                '0' => bits.push(false),
                '1' => bits.push(true),
                c if c.is_whitespace() => {}
                c => {
                    return Err(BitstreamError::Parse(format!(
                        "unexpected character '{c}' in text bitstream"
                    )))
                }
            }
        }
        Ok(Self { bits })
    }

    /// Renders the character stream written to a `txt` file.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.bits.len() + 1);
        for bit in self.bits.iter() {
            out.push(if bit { '1' } else { '0' });
        }
        out.push('\n');
        out
    }

    /// Reads a `txt` bitstream file.
    pub fn read(path: &Path) -> Result<Self, BitstreamError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Writes the bitstream to a `txt` file.
    pub fn write(&self, path: &Path) -> Result<(), BitstreamError> {
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// Returns the number of stored bits (including padding).
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns whether no bits are stored.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}
