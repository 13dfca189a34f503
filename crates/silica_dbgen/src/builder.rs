//! Segbit-set discovery and database assembly.
//!
//! The dump lists one entry per physical bit; the builder turns that into
//! the grouped database the codec consumes:
//!
//! 1. Classify every bit path into `(block kind, grid location, local
//!    feature name)` with the same split the assembler uses.
//! 2. Derive region extents from the observed chain positions.
//! 3. For each block kind, discover the distinct normalised segbit
//!    patterns across grid locations. Tiles of one type must all share a
//!    single pattern; routing kinds may split into variants.
//! 4. Emit blocks with region-local offsets and one feature table per
//!    discovered set, then let the device model validate the result.

use crate::error::BuildError;
use crate::xml::FabricBit;
use silica_db::segbits::{split_feature_name, FeatureTable};
use silica_db::{Bit, Block, Device, Region};
use silica_fasm::resolve::{FeatureResolver, FEATURE_PREFIX};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Routing kinds the fabric may contain.
const ROUTING_KINDS: &[&str] = &["sb", "cbx", "cby"];

/// One classified bit of a block instance.
#[derive(Debug, Clone)]
struct BitRecord {
    region: u32,
    bit_id: u32,
    local_name: String,
}

/// Bits of one block kind, grouped by grid location.
type KindGroup = BTreeMap<(u32, u32), Vec<BitRecord>>;

/// One discovered segbit set: a normalised pattern plus the locations
/// sharing it.
#[derive(Debug)]
struct SegbitSet {
    /// `(bit id − instance offset, local feature name)` pairs.
    pattern: Vec<(u32, String)>,
    /// `(location, region, chain offset)` of each claimed instance.
    instances: Vec<((u32, u32), u32, u32)>,
}

/// Builds a validated device database from the fabric bit list.
///
/// # Errors
///
/// [`BuildError::Parse`] for unclassifiable paths,
/// [`BuildError::Integrity`] for cross-region blocks or tiles with more
/// than one pattern, and any validation error of the assembled device.
pub fn build_database(bits: &[FabricBit]) -> Result<Device, BuildError> {
    let resolver = FeatureResolver::new();

    let mut tile_groups: BTreeMap<String, KindGroup> = BTreeMap::new();
    let mut routing_groups: BTreeMap<String, KindGroup> = BTreeMap::new();
    let mut extents: BTreeMap<u32, (u32, u32)> = BTreeMap::new();

    for bit in bits {
        let entry = extents.entry(bit.region).or_insert((bit.id, bit.id));
        entry.0 = entry.0.min(bit.id);
        entry.1 = entry.1.max(bit.id);

        let parts: Vec<&str> = bit.path.split('.').collect();
        if parts.len() < 3 || parts[0] != FEATURE_PREFIX {
            return Err(BuildError::Parse(format!(
                "bit path '{}' is not a '{FEATURE_PREFIX}' feature",
                bit.path
            )));
        }
        let (name, x, y) = resolver.parse_block_tag(parts[1]).ok_or_else(|| {
            BuildError::Parse(format!("bit path '{}' has a malformed block tag", bit.path))
        })?;
        let record = BitRecord {
            region: bit.region,
            bit_id: bit.id,
            local_name: parts[2..].join("."),
        };

        if let Some(kind) = name.strip_prefix("grid_") {
            tile_groups
                .entry(kind.to_string())
                .or_default()
                .entry((x, y))
                .or_default()
                .push(record);
        } else {
            let kind = name.split('_').next().unwrap_or(name.as_str());
            if !ROUTING_KINDS.contains(&kind) {
                return Err(BuildError::Parse(format!(
                    "bit path '{}' names unknown block kind '{kind}'",
                    bit.path
                )));
            }
            routing_groups
                .entry(kind.to_string())
                .or_default()
                .entry((x, y))
                .or_default()
                .push(record);
        }
    }

    // Region extents: offset is the lowest observed chain position.
    let mut regions = BTreeMap::new();
    for (&id, &(min, max)) in &extents {
        regions.insert(
            id,
            Region {
                id,
                offset: min,
                length: max - min + 1,
            },
        );
    }
    let bitstream_size = regions.values().map(|r| r.length).sum();

    let mut tiles = BTreeMap::new();
    let mut routing: BTreeMap<(u32, u32), BTreeMap<String, Block>> = BTreeMap::new();
    let mut features = BTreeMap::new();

    for (kind, mut group) in tile_groups {
        check_single_region(&kind, &group)?;
        sort_records(&mut group);
        let sets = discover_sets(&group);
        if sets.len() > 1 {
            return Err(BuildError::Integrity(format!(
                "tile kind '{kind}' has {} distinct segbit patterns; tiles of one type must be bit-identical",
                sets.len()
            )));
        }
        for set in sets {
            features.insert(kind.clone(), pattern_to_table(&set.pattern)?);
            for ((x, y), region, offset) in set.instances {
                let region_offset = region_local_offset(&regions, region, offset)?;
                tiles.insert(
                    (x, y),
                    Block {
                        kind: kind.clone(),
                        variant: None,
                        x,
                        y,
                        region,
                        offset: region_offset,
                    },
                );
            }
        }
    }

    for (kind, mut group) in routing_groups {
        check_single_region(&kind, &group)?;
        sort_records(&mut group);
        for (variant, set) in discover_sets(&group).into_iter().enumerate() {
            let variant = variant as u32;
            features.insert(format!("{kind}_{variant}"), pattern_to_table(&set.pattern)?);
            for ((x, y), region, offset) in set.instances {
                let region_offset = region_local_offset(&regions, region, offset)?;
                routing.entry((x, y)).or_default().insert(
                    kind.clone(),
                    Block {
                        kind: kind.clone(),
                        variant: Some(variant),
                        x,
                        y,
                        region,
                        offset: region_offset,
                    },
                );
            }
        }
    }

    let device = Device {
        bitstream_size,
        regions,
        tiles,
        routing,
        features,
        default_bitstream: None,
        root: PathBuf::new(),
    };
    device.validate()?;
    Ok(device)
}

/// Fails if any location of the kind spreads its bits over two regions.
fn check_single_region(kind: &str, group: &KindGroup) -> Result<(), BuildError> {
    for ((x, y), records) in group {
        let mut regions = records.iter().map(|r| r.region);
        if let Some(first) = regions.next() {
            if regions.any(|r| r != first) {
                return Err(BuildError::Integrity(format!(
                    "block '{kind}' at ({x}, {y}) spans more than one region"
                )));
            }
        }
    }
    Ok(())
}

/// Sorts every location's records by local name, then chain position.
fn sort_records(group: &mut KindGroup) {
    for records in group.values_mut() {
        records.sort_by(|a, b| {
            a.local_name
                .cmp(&b.local_name)
                .then(a.bit_id.cmp(&b.bit_id))
        });
    }
}

/// Normalises one location's records: bit ids rebased to the location's
/// lowest position, paired with their local names.
fn normalise(records: &[BitRecord]) -> Vec<(u32, String)> {
    let offset = records.iter().map(|r| r.bit_id).min().unwrap_or(0);
    records
        .iter()
        .map(|r| (r.bit_id - offset, r.local_name.clone()))
        .collect()
}

/// Discovers the distinct normalised patterns of a kind.
///
/// Repeatedly seeds from the first unclaimed location and claims every
/// location whose normalised pattern equals the seed's. Locations iterate
/// in grid order, so set indexes are deterministic.
fn discover_sets(group: &KindGroup) -> Vec<SegbitSet> {
    let mut remaining: Vec<(&(u32, u32), &Vec<BitRecord>)> = group.iter().collect();
    let mut sets = Vec::new();

    while let Some((_, seed_records)) = remaining.first() {
        let seed_pattern = normalise(seed_records);
        let mut instances = Vec::new();
        remaining.retain(|entry| {
            let (location, records) = *entry;
            if normalise(records) == seed_pattern {
                let offset = records.iter().map(|r| r.bit_id).min().unwrap_or(0);
                let region = records.first().map(|r| r.region).unwrap_or(0);
                instances.push((*location, region, offset));
                false
            } else {
                true
            }
        });
        sets.push(SegbitSet {
            pattern: seed_pattern,
            instances,
        });
    }
    sets
}

/// Converts a normalised pattern into the grouped feature table form.
fn pattern_to_table(pattern: &[(u32, String)]) -> Result<FeatureTable, BuildError> {
    let mut table = FeatureTable::new();
    for (bit_index, local_name) in pattern {
        let (name, index) = split_feature_name(local_name)
            .map_err(|e| BuildError::Parse(format!("feature '{local_name}': {e}")))?;
        table
            .entry(name)
            .or_default()
            .entry(index)
            .or_default()
            .push(Bit::new(*bit_index, true));
    }
    for patterns in table.values_mut() {
        for bits in patterns.values_mut() {
            bits.sort();
        }
    }
    Ok(table)
}

/// Rebases a chain offset to its region's start.
fn region_local_offset(
    regions: &BTreeMap<u32, Region>,
    region: u32,
    offset: u32,
) -> Result<u32, BuildError> {
    let region = regions
        .get(&region)
        .ok_or_else(|| BuildError::Integrity(format!("bit references missing region {region}")))?;
    Ok(offset - region.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_fabric_xml;

    /// A two-region fabric: two identical clb tiles and an sb in region 0,
    /// a second sb with a different pattern in region 1.
    fn fixture_xml() -> &'static str {
        r#"<fabric_bitstream>
            <region id="0">
                <bit id="0" path="fpga_top.grid_clb_0__0_.LUT_INIT[0]"/>
                <bit id="1" path="fpga_top.grid_clb_0__0_.LUT_INIT[1]"/>
                <bit id="2" path="fpga_top.grid_clb_0__0_.MODE"/>
                <bit id="4" path="fpga_top.sb_0__0_.ROUTING.SEL0"/>
                <bit id="5" path="fpga_top.sb_0__0_.ROUTING.SEL1"/>
                <bit id="8" path="fpga_top.grid_clb_1__0_.LUT_INIT[0]"/>
                <bit id="9" path="fpga_top.grid_clb_1__0_.LUT_INIT[1]"/>
                <bit id="10" path="fpga_top.grid_clb_1__0_.MODE"/>
            </region>
            <region id="1">
                <bit id="11" path="fpga_top.sb_1__1_.ROUTING.SEL0"/>
                <bit id="12" path="fpga_top.sb_1__1_.ROUTING.SEL1"/>
                <bit id="13" path="fpga_top.sb_1__1_.ROUTING.EXTRA"/>
            </region>
        </fabric_bitstream>"#
    }

    fn build_fixture() -> Device {
        build_database(&parse_fabric_xml(fixture_xml()).unwrap()).unwrap()
    }

    #[test]
    fn region_extents_from_chain_positions() {
        let device = build_fixture();
        assert_eq!(device.regions[&0], Region { id: 0, offset: 0, length: 11 });
        assert_eq!(device.regions[&1], Region { id: 1, offset: 11, length: 3 });
        assert_eq!(device.bitstream_size, 14);
    }

    #[test]
    fn identical_tiles_share_one_table() {
        let device = build_fixture();
        assert_eq!(device.tiles.len(), 2);
        assert!(device.features.contains_key("clb"));

        let table = &device.features["clb"];
        assert_eq!(table["LUT_INIT"][&Some(0)], vec![Bit::new(0, true)]);
        assert_eq!(table["LUT_INIT"][&Some(1)], vec![Bit::new(1, true)]);
        assert_eq!(table["MODE"][&None], vec![Bit::new(2, true)]);
    }

    #[test]
    fn block_offsets_are_region_local() {
        let device = build_fixture();
        assert_eq!(device.tiles[&(0, 0)].offset, 0);
        assert_eq!(device.tiles[&(1, 0)].offset, 8);
        // The region-1 sb starts at chain position 11 = region offset 11.
        assert_eq!(device.routing[&(1, 1)]["sb"].offset, 0);
        assert_eq!(device.routing[&(1, 1)]["sb"].region, 1);
    }

    #[test]
    fn routing_patterns_split_into_variants() {
        let device = build_fixture();
        assert!(device.features.contains_key("sb_0"));
        assert!(device.features.contains_key("sb_1"));
        assert_eq!(device.routing[&(0, 0)]["sb"].variant, Some(0));
        assert_eq!(device.routing[&(1, 1)]["sb"].variant, Some(1));

        // Variant 1 carries the extra feature.
        assert!(device.features["sb_1"].contains_key("ROUTING.EXTRA"));
        assert!(!device.features["sb_0"].contains_key("ROUTING.EXTRA"));
    }

    #[test]
    fn built_device_validates() {
        let device = build_fixture();
        assert!(device.validate().is_ok());
    }

    #[test]
    fn divergent_tiles_fail() {
        let xml = r#"<fabric_bitstream>
            <region id="0">
                <bit id="0" path="fpga_top.grid_clb_0__0_.MODE"/>
                <bit id="1" path="fpga_top.grid_clb_1__0_.OTHER"/>
            </region>
        </fabric_bitstream>"#;
        let err = build_database(&parse_fabric_xml(xml).unwrap()).unwrap_err();
        assert!(matches!(err, BuildError::Integrity(_)));
        assert!(format!("{err}").contains("bit-identical"));
    }

    #[test]
    fn cross_region_block_fails() {
        let xml = r#"<fabric_bitstream>
            <region id="0">
                <bit id="0" path="fpga_top.grid_clb_0__0_.MODE"/>
            </region>
            <region id="1">
                <bit id="1" path="fpga_top.grid_clb_0__0_.OTHER"/>
            </region>
        </fabric_bitstream>"#;
        let err = build_database(&parse_fabric_xml(xml).unwrap()).unwrap_err();
        assert!(matches!(err, BuildError::Integrity(_)));
        assert!(format!("{err}").contains("more than one region"));
    }

    #[test]
    fn unknown_block_kind_fails() {
        let xml = r#"<fabric_bitstream>
            <region id="0">
                <bit id="0" path="fpga_top.zb_0__0_.MODE"/>
            </region>
        </fabric_bitstream>"#;
        let err = build_database(&parse_fabric_xml(xml).unwrap()).unwrap_err();
        assert!(format!("{err}").contains("unknown block kind"));
    }

    #[test]
    fn non_fpga_top_path_fails() {
        let xml = r#"<fabric_bitstream>
            <region id="0">
                <bit id="0" path="chip.grid_clb_0__0_.MODE"/>
            </region>
        </fabric_bitstream>"#;
        assert!(matches!(
            build_database(&parse_fabric_xml(xml).unwrap()),
            Err(BuildError::Parse(_))
        ));
    }

    #[test]
    fn multi_bit_local_feature_groups() {
        // Two chain bits sharing one local name become a two-bit pattern.
        let xml = r#"<fabric_bitstream>
            <region id="0">
                <bit id="0" path="fpga_top.grid_clb_0__0_.FF.ENABLE"/>
                <bit id="1" path="fpga_top.grid_clb_0__0_.FF.ENABLE"/>
            </region>
        </fabric_bitstream>"#;
        let device = build_database(&parse_fabric_xml(xml).unwrap()).unwrap();
        let pattern = &device.features["clb"]["FF.ENABLE"][&None];
        assert_eq!(pattern, &vec![Bit::new(0, true), Bit::new(1, true)]);
    }

    #[test]
    fn save_and_reload_built_database() {
        let device = build_fixture();
        let dir = std::env::temp_dir().join(format!("silica_dbgen_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        device.save(&dir).unwrap();

        let reloaded = Device::load(&dir).unwrap();
        assert_eq!(reloaded.bitstream_size, device.bitstream_size);
        assert_eq!(reloaded.regions, device.regions);
        assert_eq!(reloaded.tiles, device.tiles);
        assert_eq!(reloaded.routing, device.routing);
        assert_eq!(reloaded.features, device.features);
    }
}
