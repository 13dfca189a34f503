//! Feature path resolution: from a dotted FASM feature to a device block
//! and segbit pattern.
//!
//! A feature path has the shape `fpga_top.<block-tag>.<local.feature>`.
//! The block tag encodes the block name and its grid location, e.g.
//! `grid_clb_2__3_` (the `clb` tile at (2, 3)) or `sb_0__0_` (the switch
//! box at (0, 0)). Tile tags carry a `grid_` prefix; routing tags are
//! classified by their first `_`-delimited token. A `NOT_` prefix on the
//! last component of the local feature inverts the pattern bits on write.

use crate::error::FasmError;
use regex::Regex;
use silica_db::segbits::FeatureTable;
use silica_db::{Block, Device, SegbitPattern};

/// The mandatory first component of every feature path.
pub const FEATURE_PREFIX: &str = "fpga_top";

/// Block tag shape: `<name>_<x>__<y>_`.
const BLOCK_TAG_RE: &str = r"^(?P<name>.+)_(?P<x>[0-9]+)__(?P<y>[0-9]+)_$";

/// A feature resolved against the device model.
#[derive(Debug)]
pub struct ResolvedFeature<'a> {
    /// The block the feature configures.
    pub block: &'a Block,
    /// The feature path local to the block, with any `NOT_` prefix
    /// stripped from the last component.
    pub local_feature: String,
    /// Whether pattern bits must be inverted before writing.
    pub inverted: bool,
}

/// Resolves feature paths against a device.
///
/// Holds the compiled block-tag regex so per-record resolution does not
/// recompile it.
#[derive(Debug)]
pub struct FeatureResolver {
    block_tag: Regex,
}

impl FeatureResolver {
    /// Creates a resolver.
    pub fn new() -> Self {
        Self {
            block_tag: Regex::new(BLOCK_TAG_RE).expect("invalid block tag regex"),
        }
    }

    /// Splits a block tag into `(name, x, y)`, e.g. `grid_clb_2__3_` into
    /// `("grid_clb", 2, 3)`. Returns `None` for tags that do not match the
    /// tag shape. The database builder classifies XML bit paths with this
    /// same split.
    pub fn parse_block_tag(&self, tag: &str) -> Option<(String, u32, u32)> {
        let caps = self.block_tag.captures(tag)?;
        let x = caps["x"].parse().ok()?;
        let y = caps["y"].parse().ok()?;
        Some((caps["name"].to_string(), x, y))
    }

    /// Resolves a full dotted feature path to its block.
    ///
    /// # Errors
    ///
    /// [`FasmError::Lookup`] when the path does not name a block of the
    /// device; the caller treats these as accumulated unknown features.
    pub fn resolve<'d>(
        &self,
        device: &'d Device,
        feature: &str,
    ) -> Result<ResolvedFeature<'d>, FasmError> {
        let lookup = |reason: String| FasmError::Lookup {
            feature: feature.to_string(),
            reason,
        };

        let parts: Vec<&str> = feature.split('.').collect();
        if parts.len() < 3 {
            return Err(lookup("feature path has fewer than three components".to_string()));
        }
        if parts[0] != FEATURE_PREFIX {
            return Err(lookup(format!("feature path does not start with '{FEATURE_PREFIX}'")));
        }

        let tag = parts[1];
        let (name, x, y) = self
            .parse_block_tag(tag)
            .ok_or_else(|| lookup(format!("malformed block tag '{tag}'")))?;
        let name = name.as_str();

        let block = if let Some(tile_kind) = name.strip_prefix("grid_") {
            let block = device
                .tiles
                .get(&(x, y))
                .ok_or_else(|| lookup(format!("no tile at ({x}, {y})")))?;
            if block.kind != tile_kind {
                return Err(lookup(format!(
                    "tile at ({x}, {y}) is '{}', not '{tile_kind}'",
                    block.kind
                )));
            }
            block
        } else {
            let kind = name.split('_').next().unwrap_or(name);
            device
                .routing
                .get(&(x, y))
                .and_then(|blocks| blocks.get(kind))
                .ok_or_else(|| lookup(format!("no routing block '{kind}' at ({x}, {y})")))?
        };

        let mut local_parts: Vec<&str> = parts[2..].to_vec();
        let mut inverted = false;
        if let Some(last) = local_parts.last_mut() {
            if let Some(stripped) = last.strip_prefix("NOT_") {
                *last = stripped;
                inverted = true;
            }
        }

        Ok(ResolvedFeature {
            block,
            local_feature: local_parts.join("."),
            inverted,
        })
    }
}

impl Default for FeatureResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks up a feature's segbit pattern with the sub-index tie-break:
/// sub-index 0 (or none) tries the unindexed entry first, then `[0]`;
/// other sub-indexes are looked up directly.
pub fn lookup_pattern<'a>(
    table: &'a FeatureTable,
    local_feature: &str,
    sub_index: Option<u32>,
) -> Option<&'a SegbitPattern> {
    let patterns = table.get(local_feature)?;
    match sub_index {
        None | Some(0) => patterns.get(&None).or_else(|| patterns.get(&Some(0))),
        Some(index) => patterns.get(&Some(index)),
    }
}

/// Reconstructs a block's tag, the inverse of [`FeatureResolver::resolve`].
pub fn block_tag(block: &Block) -> String {
    match block.variant {
        Some(_) => format!("{}_{}__{}_", block.kind, block.x, block.y),
        None => format!("grid_{}_{}__{}_", block.kind, block.x, block.y),
    }
}

/// Returns the full dotted feature path of a block-local feature.
pub fn full_feature_name(block: &Block, local_feature: &str) -> String {
    format!("{FEATURE_PREFIX}.{}.{local_feature}", block_tag(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_db::segbits::parse_segbits;
    use silica_db::Region;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    /// Two-region in-memory device: clb tiles at (0,0), (1,0), (0,1); an
    /// sb and a cbx at (0,0); an sb at (1,1).
    fn fixture_device() -> Device {
        let mut regions = BTreeMap::new();
        regions.insert(0, Region { id: 0, offset: 0, length: 48 });
        regions.insert(1, Region { id: 1, offset: 48, length: 32 });

        let tile = |x, y, region, offset| Block {
            kind: "clb".to_string(),
            variant: None,
            x,
            y,
            region,
            offset,
        };
        let routing_block = |kind: &str, x, y, region, offset| Block {
            kind: kind.to_string(),
            variant: Some(0),
            x,
            y,
            region,
            offset,
        };

        let mut tiles = BTreeMap::new();
        tiles.insert((0, 0), tile(0, 0, 0, 0));
        tiles.insert((1, 0), tile(1, 0, 0, 16));
        tiles.insert((0, 1), tile(0, 1, 1, 0));

        let mut routing: BTreeMap<(u32, u32), BTreeMap<String, Block>> = BTreeMap::new();
        routing
            .entry((0, 0))
            .or_default()
            .insert("sb".to_string(), routing_block("sb", 0, 0, 0, 32));
        routing
            .entry((0, 0))
            .or_default()
            .insert("cbx".to_string(), routing_block("cbx", 0, 0, 0, 40));
        routing
            .entry((1, 1))
            .or_default()
            .insert("sb".to_string(), routing_block("sb", 1, 1, 1, 8));

        let mut features = BTreeMap::new();
        features.insert(
            "clb".to_string(),
            parse_segbits(
                "LUT_INIT[0] 0\nLUT_INIT[1] 1\nLUT_INIT[2] 2\nLUT_INIT[3] 3\nFF.ENABLE 4 !5\nMODE 6\n",
            )
            .unwrap(),
        );
        features.insert(
            "sb_0".to_string(),
            parse_segbits("ROUTING.SEL0 0 1\nROUTING.SEL1 !2 3\n").unwrap(),
        );
        features.insert(
            "cbx_0".to_string(),
            parse_segbits("ROUTING.EN 0\n").unwrap(),
        );

        Device {
            bitstream_size: 80,
            regions,
            tiles,
            routing,
            features,
            default_bitstream: None,
            root: PathBuf::new(),
        }
    }

    #[test]
    fn resolve_tile_feature() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let resolved = resolver
            .resolve(&device, "fpga_top.grid_clb_1__0_.FF.ENABLE")
            .unwrap();
        assert_eq!(resolved.block.x, 1);
        assert_eq!(resolved.block.y, 0);
        assert_eq!(resolved.local_feature, "FF.ENABLE");
        assert!(!resolved.inverted);
    }

    #[test]
    fn resolve_routing_feature() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let resolved = resolver
            .resolve(&device, "fpga_top.sb_1__1_.ROUTING.SEL0")
            .unwrap();
        assert_eq!(resolved.block.kind, "sb");
        assert_eq!(resolved.block.region, 1);
    }

    #[test]
    fn resolve_not_prefix_inverts() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let resolved = resolver
            .resolve(&device, "fpga_top.grid_clb_0__0_.FF.NOT_ENABLE")
            .unwrap();
        assert_eq!(resolved.local_feature, "FF.ENABLE");
        assert!(resolved.inverted);
    }

    #[test]
    fn not_prefix_only_applies_to_last_component() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let resolved = resolver
            .resolve(&device, "fpga_top.grid_clb_0__0_.NOT_FF.ENABLE")
            .unwrap();
        assert_eq!(resolved.local_feature, "NOT_FF.ENABLE");
        assert!(!resolved.inverted);
    }

    #[test]
    fn reject_wrong_prefix() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let err = resolver
            .resolve(&device, "chip_top.grid_clb_0__0_.MODE")
            .unwrap_err();
        assert!(matches!(err, FasmError::Lookup { .. }));
    }

    #[test]
    fn reject_short_path() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let err = resolver.resolve(&device, "fpga_top.grid_clb_0__0_").unwrap_err();
        assert!(matches!(err, FasmError::Lookup { .. }));
    }

    #[test]
    fn reject_malformed_tag() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let err = resolver.resolve(&device, "fpga_top.grid_clb_00_.MODE").unwrap_err();
        assert!(format!("{err}").contains("malformed block tag"));
    }

    #[test]
    fn reject_missing_tile() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let err = resolver
            .resolve(&device, "fpga_top.grid_clb_9__9_.MODE")
            .unwrap_err();
        assert!(format!("{err}").contains("no tile at (9, 9)"));
    }

    #[test]
    fn reject_tile_kind_mismatch() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let err = resolver
            .resolve(&device, "fpga_top.grid_mem_0__0_.MODE")
            .unwrap_err();
        assert!(format!("{err}").contains("not 'mem'"));
    }

    #[test]
    fn reject_missing_routing_block() {
        let device = fixture_device();
        let resolver = FeatureResolver::new();
        let err = resolver
            .resolve(&device, "fpga_top.cby_0__0_.ROUTING.EN")
            .unwrap_err();
        assert!(format!("{err}").contains("no routing block 'cby'"));
    }

    #[test]
    fn lookup_unindexed_then_indexed_zero() {
        let device = fixture_device();
        let table = &device.features["clb"];
        // MODE has only an unindexed entry.
        assert!(lookup_pattern(table, "MODE", None).is_some());
        assert!(lookup_pattern(table, "MODE", Some(0)).is_some());
        // LUT_INIT has only indexed entries; sub-index 0 falls through.
        assert!(lookup_pattern(table, "LUT_INIT", None).is_some());
        assert!(lookup_pattern(table, "LUT_INIT", Some(0)).is_some());
        assert!(lookup_pattern(table, "LUT_INIT", Some(3)).is_some());
    }

    #[test]
    fn lookup_missing_is_none() {
        let device = fixture_device();
        let table = &device.features["clb"];
        assert!(lookup_pattern(table, "NO_SUCH", None).is_none());
        assert!(lookup_pattern(table, "MODE", Some(1)).is_none());
        assert!(lookup_pattern(table, "LUT_INIT", Some(4)).is_none());
    }

    #[test]
    fn parse_block_tag_components() {
        let resolver = FeatureResolver::new();
        assert_eq!(
            resolver.parse_block_tag("grid_clb_2__3_"),
            Some(("grid_clb".to_string(), 2, 3))
        );
        assert_eq!(
            resolver.parse_block_tag("sb_10__0_"),
            Some(("sb".to_string(), 10, 0))
        );
        assert_eq!(resolver.parse_block_tag("clb_2_3"), None);
    }

    #[test]
    fn block_tag_roundtrip() {
        let device = fixture_device();
        assert_eq!(block_tag(&device.tiles[&(1, 0)]), "grid_clb_1__0_");
        assert_eq!(block_tag(&device.routing[&(0, 0)]["cbx"]), "cbx_0__0_");
    }

    #[test]
    fn full_feature_name_format() {
        let device = fixture_device();
        assert_eq!(
            full_feature_name(&device.tiles[&(0, 1)], "FF.ENABLE"),
            "fpga_top.grid_clb_0__1_.FF.ENABLE"
        );
    }
}
