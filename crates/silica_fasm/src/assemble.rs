//! The FASM assembler: canonical set-feature records to bit mutations.
//!
//! An assembler owns a working flat bit array for the duration of one
//! assemble call — freshly zeroed, or seeded from a decoded default
//! bitstream that user FASM overlays. Records are processed in input
//! order; features that do not resolve are accumulated and returned
//! (the driver decides whether they are fatal), while conflicts abort
//! immediately.
//!
//! # Conflict detection
//!
//! Two independent checks guard against contradictory FASM:
//!
//! 1. Feature-value conflicts, keyed by `(feature, sub-index)`: the first
//!    seen value wins for reporting, and any later record with a different
//!    value is an error.
//! 2. Bit conflicts, keyed by absolute bit address: only bits written
//!    during this assemble participate, so overlaying the default
//!    bitstream never conflicts, but two lines driving one bit to
//!    different values always do. Consistent re-writes are allowed and
//!    remember every contributing line.

use crate::error::FasmError;
use crate::record::SetFeature;
use crate::resolve::{self, FeatureResolver};
use silica_bitstream::FlatBitstream;
use silica_db::Device;
use std::collections::HashMap;

/// First-seen value of a `(feature, sub-index)` key.
struct FeatureClaim {
    value: u64,
    line: String,
}

/// Ownership record of one written bit.
struct BitClaim {
    value: bool,
    lines: Vec<String>,
}

/// Assembles set-feature records into a flat bit array.
pub struct Assembler<'a> {
    device: &'a Device,
    resolver: FeatureResolver,
    bits: FlatBitstream,
    feature_values: HashMap<(String, Option<u32>), FeatureClaim>,
    written: HashMap<u32, BitClaim>,
}

impl<'a> Assembler<'a> {
    /// Creates an assembler over a zeroed array, or over `seed` (the
    /// decoded default bitstream) if one is given.
    pub fn new(device: &'a Device, seed: Option<FlatBitstream>) -> Self {
        let bits = seed.unwrap_or_else(|| FlatBitstream::new(device.bitstream_size));
        Self {
            device,
            resolver: FeatureResolver::new(),
            bits,
            feature_values: HashMap::new(),
            written: HashMap::new(),
        }
    }

    /// Applies records in order and returns the ones that failed to
    /// resolve (unknown features).
    ///
    /// # Errors
    ///
    /// [`FasmError::FeatureConflict`] aborts immediately; lookup failures
    /// are collected, one per distinct feature, not raised.
    pub fn assemble(&mut self, records: &[SetFeature]) -> Result<Vec<SetFeature>, FasmError> {
        let mut unknown: Vec<SetFeature> = Vec::new();
        for record in records {
            for single in record.canonicalise() {
                match self.apply(&single) {
                    Ok(()) => {}
                    Err(err @ FasmError::Lookup { .. }) => {
                        log::debug!("{err}");
                        if !unknown.iter().any(|u| u.feature == single.feature) {
                            unknown.push(single);
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
        }
        Ok(unknown)
    }

    /// Consumes the assembler and returns the finished bit array.
    pub fn into_bits(self) -> FlatBitstream {
        self.bits
    }

    /// Returns the working bit array.
    pub fn bits(&self) -> &FlatBitstream {
        &self.bits
    }

    /// Applies one canonical single-bit record.
    fn apply(&mut self, record: &SetFeature) -> Result<(), FasmError> {
        let resolved = self.resolver.resolve(self.device, &record.feature)?;
        let table = self
            .device
            .block_features(resolved.block)
            .ok_or_else(|| FasmError::Lookup {
                feature: record.feature.clone(),
                reason: format!("no segbits table '{}'", resolved.block.segbits_key()),
            })?;
        let pattern = resolve::lookup_pattern(table, &resolved.local_feature, record.sub_index())
            .ok_or_else(|| FasmError::Lookup {
                feature: record.feature.clone(),
                reason: match record.sub_index() {
                    Some(index) => {
                        format!("no segbit pattern for '{}[{index}]'", resolved.local_feature)
                    }
                    None => format!("no segbit pattern for '{}'", resolved.local_feature),
                },
            })?;

        // Feature-value conflict check; the first-seen value wins for
        // reporting purposes.
        let key = (record.feature.clone(), record.sub_index());
        if let Some(claim) = self.feature_values.get(&key) {
            if claim.value != record.value {
                return Err(FasmError::FeatureConflict {
                    message: format!(
                        "feature '{}' assigned both {} and {}",
                        record.feature, claim.value, record.value
                    ),
                    line: record.line.clone(),
                    previous: claim.line.clone(),
                });
            }
        } else {
            self.feature_values.insert(
                key,
                FeatureClaim {
                    value: record.value,
                    line: record.line.clone(),
                },
            );
        }

        // A cleared feature asserts nothing at the bit level.
        if record.value == 0 {
            return Ok(());
        }

        for bit in pattern {
            let value = bit.value ^ resolved.inverted;
            let address = self
                .device
                .bit_address(resolved.block, bit.index)
                .ok_or_else(|| FasmError::Lookup {
                    feature: record.feature.clone(),
                    reason: format!("block references missing region {}", resolved.block.region),
                })?;
            self.write_bit(address, value, &record.line)?;
        }
        Ok(())
    }

    /// Writes one bit, enforcing consistency with prior writes.
    fn write_bit(&mut self, address: u32, value: bool, line: &str) -> Result<(), FasmError> {
        match self.written.get_mut(&address) {
            Some(claim) if claim.value != value => Err(FasmError::FeatureConflict {
                message: format!(
                    "bit {address} driven to both {} and {}",
                    claim.value as u8, value as u8
                ),
                line: line.to_string(),
                previous: claim.lines.first().cloned().unwrap_or_default(),
            }),
            Some(claim) => {
                claim.lines.push(line.to_string());
                Ok(())
            }
            None => {
                self.written.insert(
                    address,
                    BitClaim {
                        value,
                        lines: vec![line.to_string()],
                    },
                );
                self.bits.set(address, value);
                Ok(())
            }
        }
    }
}
