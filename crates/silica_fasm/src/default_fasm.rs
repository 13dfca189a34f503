//! Default-FASM generation.
//!
//! Given a device and a set of segbit feature names, writes a FASM file
//! naming every tile instance of those features, set to 1. This is a
//! database-preparation aid for building factory default bitstreams.
//!
//! Limitations carried over from the workflow this supports: only tile
//! features participate (routing features are skipped), and multi-bit
//! features can only be set to all-ones.

use crate::record::SetFeature;
use crate::resolve;
use silica_db::Device;

/// Produces FASM text setting `feature_names` in every tile that has them.
///
/// Feature names are processed in input order; within one feature, tile
/// instances are emitted in grid order. Names found in no tile's segbits
/// are logged as warnings and skipped.
pub fn make_default_fasm(device: &Device, feature_names: &[String]) -> String {
    let mut out = String::new();
    for name in feature_names {
        let mut found = false;
        for block in device.tiles.values() {
            let Some(table) = device.block_features(block) else {
                continue;
            };
            let Some(patterns) = table.get(name) else {
                continue;
            };
            found = true;

            let full = resolve::full_feature_name(block, name);
            let width = if patterns.contains_key(&None) {
                1
            } else {
                patterns.len() as u32
            };
            if width <= 1 {
                out.push_str(&full);
                out.push('\n');
            } else {
                let value = if width >= 64 {
                    u64::MAX
                } else {
                    (1u64 << width) - 1
                };
                let record = SetFeature {
                    feature: full,
                    start: Some(0),
                    end: Some(width - 1),
                    value,
                    line: String::new(),
                };
                out.push_str(&record.to_string());
                out.push('\n');
            }
        }
        if !found {
            log::warn!("feature '{name}' not found in any tile segbits; skipping");
        }
    }
    out
}
