//! The disassembler: a flat bit array back to canonical feature records.
//!
//! A feature is declared set iff every bit of its pattern — including the
//! `!` zero-bits — matches the bit array at its absolute address. Multi-bit
//! features aggregate their matched sub-indexes into one record with
//! sub-index 0 as the least-significant bit. Output order is deterministic:
//! tiles sorted by grid location, then routing blocks sorted by location
//! and kind, features sorted by name within each block.
//!
//! Alongside the FASM records the disassembler produces the force-bit
//! list, a second serialisation of the same content used as testbench
//! forcing directives: one `force <feature>[<idx>]=1'b1;` line per SET
//! bit. Cleared features never appear there, even when the caller asks
//! for them in the FASM output.

use crate::record::SetFeature;
use crate::resolve;
use silica_bitstream::FlatBitstream;
use silica_db::{Block, Device, SegbitPattern};

/// The result of disassembling one bit array.
#[derive(Debug, Clone, Default)]
pub struct Disassembly {
    /// Canonical feature records, in deterministic device order.
    pub records: Vec<SetFeature>,
    /// Force-bit directives for every set bit.
    pub force_bits: Vec<String>,
}

impl Disassembly {
    /// Renders the force-bit directives, one per line.
    pub fn render_force_bits(&self) -> String {
        let mut out = String::new();
        for line in &self.force_bits {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Disassembles a flat bit array against the device model.
///
/// When `include_unset` is set, features that evaluate to zero are emitted
/// too (in their explicit `=0` spellings); the force-bit list is unaffected.
pub fn disassemble(device: &Device, bits: &FlatBitstream, include_unset: bool) -> Disassembly {
    let mut out = Disassembly::default();

    let tiles = device.tiles.values();
    let routing = device.routing.values().flat_map(|blocks| blocks.values());
    for block in tiles.chain(routing) {
        let Some(table) = device.block_features(block) else {
            continue;
        };
        for (name, patterns) in table {
            let full = resolve::full_feature_name(block, name);

            if let Some(pattern) = patterns.get(&None) {
                let set = pattern_matches(device, block, pattern, bits);
                if set || include_unset {
                    out.records.push(SetFeature {
                        feature: full.clone(),
                        start: None,
                        end: None,
                        value: set as u64,
                        line: String::new(),
                    });
                }
                if set {
                    out.force_bits.push(format!("force {full}[0]=1'b1;"));
                }
                continue;
            }

            let width = patterns.len() as u32;
            let mut value = 0u64;
            for (index, pattern) in patterns {
                if let Some(k) = index {
                    if *k < 64 && pattern_matches(device, block, pattern, bits) {
                        value |= 1u64 << k;
                    }
                }
            }

            if value != 0 || include_unset {
                if width == 1 {
                    // A dense single-index feature is spelled unindexed.
                    out.records.push(SetFeature {
                        feature: full.clone(),
                        start: None,
                        end: None,
                        value,
                        line: String::new(),
                    });
                } else {
                    out.records.push(SetFeature {
                        feature: full.clone(),
                        start: Some(0),
                        end: Some(width - 1),
                        value,
                        line: String::new(),
                    });
                }
            }
            for k in 0..width.min(64) {
                if (value >> k) & 1 != 0 {
                    out.force_bits.push(format!("force {full}[{k}]=1'b1;"));
                }
            }
        }
    }
    out
}

/// Returns whether every bit of the pattern matches the bit array.
fn pattern_matches(
    device: &Device,
    block: &Block,
    pattern: &SegbitPattern,
    bits: &FlatBitstream,
) -> bool {
    pattern.iter().all(|bit| {
        device
            .bit_address(block, bit.index)
            .is_some_and(|address| bits.get(address) == bit.value)
    })
}
