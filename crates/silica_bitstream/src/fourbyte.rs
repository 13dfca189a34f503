//! The `4byte` external encoding: reversed 32-bit words, one per line.
//!
//! The bitstream is viewed as 32 parallel bit planes, one per region
//! (plane index = region id; planes beyond the device's region count stay
//! all-zero). Word `i` has bit `b` set iff plane `b` is 1 at position `i`.
//! The file stores one eight-hex-digit word per line, LAST word first,
//! optionally preceded by the head and tail checksum words.
//!
//! # Padding conventions
//!
//! A plane shorter than `Lmax` is padded differently for the two checksums:
//! head padding zero-extends at the top (data at `[0, length)`), tail
//! padding zero-extends at the bottom (data at `[Lmax − length, Lmax)`).
//! The data words on disk use the head convention. The tail checksum runs
//! over the reversed tail-padded stream with its first word dropped and a
//! zero word appended, matching what the hardware loader actually clocks;
//! this quirk is load-bearing and must not be "fixed".
//!
//! # State machine
//!
//! ```text
//! empty ──read──► parsed{planes, crc?} ──decode──► flat
//! flat ──encode──► built{planes, crc=∅} ──compute_checksums──►
//!     built{planes, crc=set} ──write──► file
//! ```
//!
//! `decode` ignores the stored checksum pair.

use crate::checksum::fletcher_complement;
use crate::error::BitstreamError;
use crate::flat::FlatBitstream;
use bit_vec::BitVec;
use silica_db::Device;
use std::path::Path;

/// Width of the word stream: one bit plane per possible region.
pub const PLANE_COUNT: usize = 32;

/// A bitstream in the `4byte` external representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FourByteBitstream {
    /// The 32 bit planes in the head-padded layout, each `words` long.
    planes: Vec<BitVec>,
    /// Number of data words (= padded plane length).
    words: usize,
    /// Stored (head, tail) checksum pair, if read or computed.
    crc: Option<(u32, u32)>,
}

impl FourByteBitstream {
    /// Encodes a flat bit array into bit planes.
    ///
    /// # Errors
    ///
    /// [`BitstreamError::Unsupported`] if the device has more regions than
    /// the word width can carry.
    pub fn encode(flat: &FlatBitstream, device: &Device) -> Result<Self, BitstreamError> {
        if device.region_count() as usize > PLANE_COUNT {
            return Err(BitstreamError::Unsupported(format!(
                "{} regions exceed the {PLANE_COUNT} bit planes of the 4byte encoding",
                device.region_count()
            )));
        }

        let words = device.max_region_length() as usize;
        let mut planes = vec![BitVec::from_elem(words, false); PLANE_COUNT];
        for region in device.regions.values() {
            for i in 0..region.length {
                planes[region.id as usize].set(i as usize, flat.get(region.offset + i));
            }
        }

        Ok(Self {
            planes,
            words,
            crc: None,
        })
    }

    /// Decodes the bit planes back into a flat bit array.
    ///
    /// The stored checksum pair is ignored; use
    /// [`validate_checksums`](Self::validate_checksums) to check it.
    pub fn decode(&self, device: &Device) -> FlatBitstream {
        let expected = device.max_region_length() as usize;
        if self.words < expected {
            log::error!(
                "4byte bitstream has {} words, expected {expected}; decoding what is present",
                self.words
            );
        } else if self.words > expected {
            log::warn!(
                "4byte bitstream has {} words, expected {expected}; ignoring the excess",
                self.words
            );
        }

        let mut flat = FlatBitstream::new(device.bitstream_size);
        for region in device.regions.values() {
            let Some(plane) = self.planes.get(region.id as usize) else {
                continue;
            };
            for i in 0..region.length {
                if let Some(value) = plane.get(i as usize) {
                    flat.set(region.offset + i, value);
                }
            }
        }
        flat
    }

    /// Computes and stores the head and tail checksum pair.
    pub fn compute_checksums(&mut self, device: &Device) {
        self.crc = Some(self.computed_checksums(device));
    }

    /// Recomputes the checksum pair and compares it to the stored one.
    ///
    /// Returns false when no pair is stored.
    pub fn validate_checksums(&self, device: &Device) -> bool {
        match self.crc {
            Some(stored) => stored == self.computed_checksums(device),
            None => false,
        }
    }

    /// Returns the stored (head, tail) checksum pair, if any.
    pub fn checksums(&self) -> Option<(u32, u32)> {
        self.crc
    }

    /// Overrides the stored checksum pair (used by tests and tooling).
    pub fn set_checksums(&mut self, crc: Option<(u32, u32)>) {
        self.crc = crc;
    }

    /// Returns the number of data words.
    pub fn word_count(&self) -> usize {
        self.words
    }

    /// Parses the line-per-word file content.
    ///
    /// When `with_crc` is set the first two words are taken as the head and
    /// tail checksums; the remainder is the reversed data stream either way.
    ///
    /// # Errors
    ///
    /// [`BitstreamError::Parse`] for lines that are not exactly eight hex
    /// digits, or when checksum words are requested but absent.
    pub fn parse(content: &str, with_crc: bool) -> Result<Self, BitstreamError> {
        let mut stream = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.len() != 8 || !line.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(BitstreamError::Parse(format!(
                    "line {}: expected eight hex digits, found '{line}'",
                    line_no + 1
                )));
            }
            let word = u32::from_str_radix(line, 16)
                .map_err(|e| BitstreamError::Parse(format!("line {}: {e}", line_no + 1)))?;
            stream.push(word);
        }

        let (crc, data) = if with_crc {
            if stream.len() < 2 {
                return Err(BitstreamError::Parse(
                    "expected head and tail checksum words".to_string(),
                ));
            }
            (Some((stream[0], stream[1])), &stream[2..])
        } else {
            (None, &stream[..])
        };

        let words = data.len();
        let mut planes = vec![BitVec::from_elem(words, false); PLANE_COUNT];
        for (reversed_index, &word) in data.iter().enumerate() {
            let i = words - 1 - reversed_index;
            for (b, plane) in planes.iter_mut().enumerate() {
                plane.set(i, (word >> b) & 1 != 0);
            }
        }

        Ok(Self { planes, words, crc })
    }

    /// Renders the file content: checksum words (if stored) followed by the
    /// reversed data stream.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some((head, tail)) = self.crc {
            out.push_str(&format!("{head:08X}\n{tail:08X}\n"));
        }
        for word in self.head_words().into_iter().rev() {
            out.push_str(&format!("{word:08X}\n"));
        }
        out
    }

    /// Reads a `4byte` bitstream file.
    pub fn read(path: &Path, with_crc: bool) -> Result<Self, BitstreamError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, with_crc)
    }

    /// Writes the bitstream to a `4byte` file.
    pub fn write(&self, path: &Path) -> Result<(), BitstreamError> {
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// Assembles the natural-order word stream from the head-padded planes.
    fn head_words(&self) -> Vec<u32> {
        (0..self.words)
            .map(|i| {
                let mut word = 0u32;
                for (b, plane) in self.planes.iter().enumerate() {
                    if plane.get(i).unwrap_or(false) {
                        word |= 1 << b;
                    }
                }
                word
            })
            .collect()
    }

    /// Assembles the natural-order word stream from tail-padded planes:
    /// region `r`'s data sits at positions `[Lmax − length, Lmax)`.
    fn tail_words(&self, device: &Device) -> Vec<u32> {
        let mut words = vec![0u32; self.words];
        for region in device.regions.values() {
            let Some(plane) = self.planes.get(region.id as usize) else {
                continue;
            };
            let shift = self.words.saturating_sub(region.length as usize);
            for (i, word) in words.iter_mut().enumerate().skip(shift) {
                if plane.get(i - shift).unwrap_or(false) {
                    *word |= 1 << region.id;
                }
            }
        }
        words
    }

    /// Computes the (head, tail) checksum pair.
    ///
    /// Head: over the reversed head-padded stream (the data words exactly
    /// as stored). Tail: over the reversed tail-padded stream with the
    /// first word dropped and a zero word appended.
    pub fn computed_checksums(&self, device: &Device) -> (u32, u32) {
        let head_stream: Vec<u32> = self.head_words().into_iter().rev().collect();
        let head = fletcher_complement(&head_stream);

        let mut tail_stream: Vec<u32> = self.tail_words(device).into_iter().rev().collect();
        if !tail_stream.is_empty() {
            tail_stream.remove(0);
        }
        tail_stream.push(0);
        let tail = fletcher_complement(&tail_stream);

        (head, tail)
    }
}
