//! The device database: regions, tiles, routing boxes, and feature tables.
//!
//! A database directory holds one `device.json` descriptor plus one segbits
//! file per distinct block kind:
//!
//! ```text
//! testdb/
//! ├── device.json
//! ├── segbits_clb.db
//! ├── segbits_sb_0.db
//! └── segbits_cbx_0.db
//! ```
//!
//! `device.json` describes the scan-chain configuration (total length and
//! region list), the tile and routing block instances, and optionally a
//! default bitstream to overlay user FASM onto. The database is immutable
//! once loaded; every cross-file invariant is checked at load time so the
//! codec can rely on it unconditionally.

use crate::error::DbError;
use crate::segbits::{self, FeatureTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The only configuration style this database model describes.
const CONFIG_TYPE_SCAN_CHAIN: &str = "scan_chain";

/// External bitstream encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    /// `'0'`/`'1'` character stream.
    #[serde(rename = "txt")]
    Text,
    /// Reversed 32-bit hex words, one per line, with optional checksums.
    #[serde(rename = "4byte")]
    FourByte,
}

/// One contiguous sub-range of the scan chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region identifier; ids cover `0..R` densely.
    pub id: u32,
    /// Starting absolute address in the flat bit array.
    pub offset: u32,
    /// Number of bits in the region.
    pub length: u32,
}

/// A configurable block instance: a tile or a routing box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Tile type (for tiles) or routing kind `sb`/`cbx`/`cby` (for routing).
    pub kind: String,
    /// Routing variant; `None` for tiles.
    pub variant: Option<u32>,
    /// Grid column.
    pub x: u32,
    /// Grid row.
    pub y: u32,
    /// Region this block's bits live in.
    pub region: u32,
    /// Starting bit index within the region.
    pub offset: u32,
}

impl Block {
    /// Returns the key of this block's feature table in [`Device::features`].
    ///
    /// Tiles share one table per type; routing boxes share one per
    /// `(kind, variant)`.
    pub fn segbits_key(&self) -> String {
        match self.variant {
            Some(variant) => format!("{}_{variant}", self.kind),
            None => self.kind.clone(),
        }
    }
}

/// Reference to a factory default bitstream shipped with the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultBitstream {
    /// File name, relative to the database root.
    pub file: String,
    /// Encoding of the file.
    pub format: Format,
}

/// The complete device database.
///
/// All collections are ordered maps so that iteration (and therefore
/// disassembly output and database re-emission) is deterministic.
#[derive(Debug, Clone)]
pub struct Device {
    /// Total length of the flat bit array, in bits.
    pub bitstream_size: u32,
    /// Regions indexed by id.
    pub regions: BTreeMap<u32, Region>,
    /// Tile blocks indexed by grid location.
    pub tiles: BTreeMap<(u32, u32), Block>,
    /// Routing blocks indexed by grid location, then by routing kind.
    pub routing: BTreeMap<(u32, u32), BTreeMap<String, Block>>,
    /// Feature tables indexed by segbits key (see [`Block::segbits_key`]).
    pub features: BTreeMap<String, FeatureTable>,
    /// Optional default bitstream reference.
    pub default_bitstream: Option<DefaultBitstream>,
    /// Directory the database was loaded from (empty for in-memory devices).
    pub root: PathBuf,
}

// On-disk JSON shape of `device.json`.

#[derive(Serialize, Deserialize)]
struct RawDevice {
    configuration: RawConfiguration,
    #[serde(default)]
    tiles: Vec<RawTile>,
    #[serde(default)]
    routing: Vec<RawRouting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_bitstream: Option<RawDefaultBitstream>,
}

#[derive(Serialize, Deserialize)]
struct RawConfiguration {
    #[serde(rename = "type")]
    config_type: String,
    length: u32,
    regions: Vec<Region>,
}

#[derive(Serialize, Deserialize)]
struct RawTile {
    #[serde(rename = "type")]
    tile_type: String,
    x: u32,
    y: u32,
    region: u32,
    offset: u32,
}

#[derive(Serialize, Deserialize)]
struct RawRouting {
    #[serde(rename = "type")]
    routing_type: String,
    variant: u32,
    x: u32,
    y: u32,
    region: u32,
    offset: u32,
}

#[derive(Serialize, Deserialize)]
struct RawDefaultBitstream {
    file: String,
    format: Format,
}

/// Routing kinds a database may declare.
const ROUTING_KINDS: &[&str] = &["sb", "cbx", "cby"];

impl Device {
    /// Loads and cross-validates a database from its root directory.
    ///
    /// # Errors
    ///
    /// [`DbError::Unsupported`] if the configuration type is not
    /// `scan_chain`; [`DbError::Parse`] for malformed files;
    /// [`DbError::Integrity`] for violated invariants; [`DbError::Io`] for
    /// unreadable files.
    pub fn load(root: &Path) -> Result<Self, DbError> {
        let descriptor_path = root.join("device.json");
        let content = std::fs::read_to_string(&descriptor_path)?;
        let raw: RawDevice = serde_json::from_str(&content)
            .map_err(|e| DbError::Parse(format!("{}: {e}", descriptor_path.display())))?;

        if raw.configuration.config_type != CONFIG_TYPE_SCAN_CHAIN {
            return Err(DbError::Unsupported(format!(
                "configuration type '{}'",
                raw.configuration.config_type
            )));
        }

        let mut regions = BTreeMap::new();
        for region in raw.configuration.regions {
            if regions.insert(region.id, region).is_some() {
                return Err(DbError::Integrity(format!("duplicate region id {}", region.id)));
            }
        }

        let mut tiles = BTreeMap::new();
        for tile in raw.tiles {
            let block = Block {
                kind: tile.tile_type,
                variant: None,
                x: tile.x,
                y: tile.y,
                region: tile.region,
                offset: tile.offset,
            };
            if let Some(prev) = tiles.insert((tile.x, tile.y), block) {
                return Err(DbError::Integrity(format!(
                    "duplicate tile at ({}, {}): '{}'",
                    tile.x, tile.y, prev.kind
                )));
            }
        }

        let mut routing: BTreeMap<(u32, u32), BTreeMap<String, Block>> = BTreeMap::new();
        for entry in raw.routing {
            if !ROUTING_KINDS.contains(&entry.routing_type.as_str()) {
                return Err(DbError::Integrity(format!(
                    "unknown routing kind '{}'",
                    entry.routing_type
                )));
            }
            let block = Block {
                kind: entry.routing_type.clone(),
                variant: Some(entry.variant),
                x: entry.x,
                y: entry.y,
                region: entry.region,
                offset: entry.offset,
            };
            let slot = routing.entry((entry.x, entry.y)).or_default();
            if slot.insert(entry.routing_type.clone(), block).is_some() {
                return Err(DbError::Integrity(format!(
                    "duplicate routing block '{}' at ({}, {})",
                    entry.routing_type, entry.x, entry.y
                )));
            }
        }

        let mut features = BTreeMap::new();
        for block in tiles.values().chain(routing.values().flat_map(|m| m.values())) {
            let key = block.segbits_key();
            if features.contains_key(&key) {
                continue;
            }
            let segbits_path = root.join(segbits::segbits_filename(&key));
            let segbits_content = std::fs::read_to_string(&segbits_path)?;
            let table = segbits::parse_segbits(&segbits_content)
                .map_err(|e| DbError::Parse(format!("{}: {e}", segbits_path.display())))?;
            features.insert(key, table);
        }

        let device = Self {
            bitstream_size: raw.configuration.length,
            regions,
            tiles,
            routing,
            features,
            default_bitstream: raw.default_bitstream.map(|d| DefaultBitstream {
                file: d.file,
                format: d.format,
            }),
            root: root.to_path_buf(),
        };
        device.validate()?;
        log::debug!(
            "loaded database {}: {} bits, {} regions, {} tiles, {} feature tables",
            root.display(),
            device.bitstream_size,
            device.regions.len(),
            device.tiles.len(),
            device.features.len()
        );
        Ok(device)
    }

    /// Writes the database back out as `device.json` plus segbits files.
    ///
    /// The inverse of [`Device::load`]; used by the database builder.
    pub fn save(&self, root: &Path) -> Result<(), DbError> {
        std::fs::create_dir_all(root)?;

        let raw = RawDevice {
            configuration: RawConfiguration {
                config_type: CONFIG_TYPE_SCAN_CHAIN.to_string(),
                length: self.bitstream_size,
                regions: self.regions.values().copied().collect(),
            },
            tiles: self
                .tiles
                .values()
                .map(|b| RawTile {
                    tile_type: b.kind.clone(),
                    x: b.x,
                    y: b.y,
                    region: b.region,
                    offset: b.offset,
                })
                .collect(),
            routing: self
                .routing
                .values()
                .flat_map(|m| m.values())
                .map(|b| RawRouting {
                    routing_type: b.kind.clone(),
                    variant: b.variant.unwrap_or(0),
                    x: b.x,
                    y: b.y,
                    region: b.region,
                    offset: b.offset,
                })
                .collect(),
            default_bitstream: self.default_bitstream.as_ref().map(|d| RawDefaultBitstream {
                file: d.file.clone(),
                format: d.format,
            }),
        };

        let json = serde_json::to_string_pretty(&raw)
            .map_err(|e| DbError::Parse(format!("device.json serialisation: {e}")))?;
        std::fs::write(root.join("device.json"), json + "\n")?;

        for (key, table) in &self.features {
            let path = root.join(segbits::segbits_filename(key));
            std::fs::write(path, segbits::render_segbits(table))?;
        }
        Ok(())
    }

    /// Returns the absolute flat-array address of bit `bit_index` of `block`.
    ///
    /// This is the only address computation the codec performs:
    /// `region.offset + block.offset + bit_index`. Returns `None` if the
    /// block references a region the device does not have (impossible for a
    /// validated device).
    pub fn bit_address(&self, block: &Block, bit_index: u32) -> Option<u32> {
        let region = self.regions.get(&block.region)?;
        Some(region.offset + block.offset + bit_index)
    }

    /// Returns the feature table of `block`, if the database defines one.
    pub fn block_features(&self, block: &Block) -> Option<&FeatureTable> {
        self.features.get(&block.segbits_key())
    }

    /// Returns the length of the longest region, the per-region slot count
    /// both external encodings pad to.
    pub fn max_region_length(&self) -> u32 {
        self.regions.values().map(|r| r.length).max().unwrap_or(0)
    }

    /// Returns the number of regions.
    pub fn region_count(&self) -> u32 {
        self.regions.len() as u32
    }

    /// Resolves the default bitstream file relative to the database root.
    pub fn default_bitstream_path(&self) -> Option<PathBuf> {
        self.default_bitstream
            .as_ref()
            .map(|d| self.root.join(&d.file))
    }

    /// Checks every cross-file invariant of the database.
    pub fn validate(&self) -> Result<(), DbError> {
        // Regions must cover 0..R densely and partition the flat array in
        // id order.
        let mut running = 0u32;
        for (expected_id, (&id, region)) in self.regions.iter().enumerate() {
            if id != expected_id as u32 {
                return Err(DbError::Integrity(format!(
                    "region ids are not dense: expected {expected_id}, found {id}"
                )));
            }
            if region.offset != running {
                return Err(DbError::Integrity(format!(
                    "region {id} starts at {} but the previous region ends at {running}",
                    region.offset
                )));
            }
            running += region.length;
        }
        if running != self.bitstream_size {
            return Err(DbError::Integrity(format!(
                "region lengths sum to {running} but the bitstream size is {}",
                self.bitstream_size
            )));
        }

        for table in self.features.values() {
            validate_table(table)?;
        }

        let blocks = self
            .tiles
            .values()
            .chain(self.routing.values().flat_map(|m| m.values()));
        for block in blocks {
            let region = self.regions.get(&block.region).ok_or_else(|| {
                DbError::Integrity(format!(
                    "block '{}' at ({}, {}) references missing region {}",
                    block.kind, block.x, block.y, block.region
                ))
            })?;
            let table = self.block_features(block).ok_or_else(|| {
                DbError::Integrity(format!(
                    "block '{}' at ({}, {}) has no segbits table '{}'",
                    block.kind,
                    block.x,
                    block.y,
                    block.segbits_key()
                ))
            })?;
            if let Some(max_index) = table_max_bit_index(table) {
                if block.offset + max_index >= region.length {
                    return Err(DbError::Integrity(format!(
                        "block '{}' at ({}, {}) reaches bit {} beyond region {} length {}",
                        block.kind,
                        block.x,
                        block.y,
                        block.offset + max_index,
                        block.region,
                        region.length
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Checks that every feature of a table is either a single unindexed
/// pattern or a dense indexed set `0..w`.
fn validate_table(table: &FeatureTable) -> Result<(), DbError> {
    for (name, patterns) in table {
        let has_unindexed = patterns.contains_key(&None);
        if has_unindexed && patterns.len() > 1 {
            return Err(DbError::Integrity(format!(
                "feature '{name}' mixes an unindexed pattern with indexed ones"
            )));
        }
        if !has_unindexed {
            for (position, index) in patterns.keys().enumerate() {
                if *index != Some(position as u32) {
                    return Err(DbError::Integrity(format!(
                        "feature '{name}' has a gap in its sub-indexes at {position}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Returns the largest bit index any pattern of the table references.
fn table_max_bit_index(table: &FeatureTable) -> Option<u32> {
    table
        .values()
        .flat_map(|patterns| patterns.values())
        .flat_map(|bits| bits.iter())
        .map(|bit| bit.index)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Writes a minimal two-region fixture database and returns its root.
    fn create_fixture_db(dir: &Path) -> PathBuf {
        fs::create_dir_all(dir).unwrap();

        let descriptor = r#"{
            "configuration": {
                "type": "scan_chain",
                "length": 80,
                "regions": [
                    {"id": 0, "offset": 0, "length": 48},
                    {"id": 1, "offset": 48, "length": 32}
                ]
            },
            "tiles": [
                {"type": "clb", "x": 0, "y": 0, "region": 0, "offset": 0},
                {"type": "clb", "x": 1, "y": 0, "region": 0, "offset": 16},
                {"type": "clb", "x": 0, "y": 1, "region": 1, "offset": 0}
            ],
            "routing": [
                {"type": "sb", "variant": 0, "x": 0, "y": 0, "region": 0, "offset": 32},
                {"type": "cbx", "variant": 0, "x": 0, "y": 0, "region": 0, "offset": 40},
                {"type": "sb", "variant": 0, "x": 1, "y": 1, "region": 1, "offset": 8}
            ]
        }"#;
        fs::write(dir.join("device.json"), descriptor).unwrap();

        let segbits_clb = "\
LUT_INIT[0] 0
LUT_INIT[1] 1
LUT_INIT[2] 2
LUT_INIT[3] 3
FF.ENABLE 4 !5
MODE 6
";
        fs::write(dir.join("segbits_clb.db"), segbits_clb).unwrap();

        let segbits_sb = "\
ROUTING.SEL0 0 1
ROUTING.SEL1 !2 3
";
        fs::write(dir.join("segbits_sb_0.db"), segbits_sb).unwrap();

        fs::write(dir.join("segbits_cbx_0.db"), "ROUTING.EN 0\n").unwrap();

        dir.to_path_buf()
    }

    /// Creates a unique temporary directory and returns its path.
    fn tempdir(suffix: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("silica_db_test_{}_{suffix}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_fixture_database() {
        let root = create_fixture_db(&tempdir("load"));
        let device = Device::load(&root).unwrap();

        assert_eq!(device.bitstream_size, 80);
        assert_eq!(device.region_count(), 2);
        assert_eq!(device.tiles.len(), 3);
        assert_eq!(device.routing.len(), 2);
        assert_eq!(device.max_region_length(), 48);
        assert!(device.features.contains_key("clb"));
        assert!(device.features.contains_key("sb_0"));
        assert!(device.features.contains_key("cbx_0"));
    }

    #[test]
    fn load_missing_descriptor() {
        let dir = tempdir("missing_descriptor");
        assert!(matches!(Device::load(&dir), Err(DbError::Io(_))));
    }

    #[test]
    fn load_rejects_non_scan_chain() {
        let dir = tempdir("frame_based");
        fs::write(
            dir.join("device.json"),
            r#"{"configuration": {"type": "frame_based", "length": 0, "regions": []}}"#,
        )
        .unwrap();
        let err = Device::load(&dir).unwrap_err();
        assert!(matches!(err, DbError::Unsupported(_)));
        assert!(format!("{err}").contains("frame_based"));
    }

    #[test]
    fn load_missing_segbits_file() {
        let root = create_fixture_db(&tempdir("missing_segbits"));
        fs::remove_file(root.join("segbits_clb.db")).unwrap();
        assert!(matches!(Device::load(&root), Err(DbError::Io(_))));
    }

    #[test]
    fn bit_address_adds_region_block_and_bit() {
        let root = create_fixture_db(&tempdir("address"));
        let device = Device::load(&root).unwrap();

        let tile = &device.tiles[&(0, 1)];
        assert_eq!(device.bit_address(tile, 3), Some(48 + 0 + 3));

        let sb = &device.routing[&(0, 0)]["sb"];
        assert_eq!(device.bit_address(sb, 1), Some(0 + 32 + 1));
    }

    #[test]
    fn segbits_key_for_tile_and_routing() {
        let root = create_fixture_db(&tempdir("keys"));
        let device = Device::load(&root).unwrap();
        assert_eq!(device.tiles[&(0, 0)].segbits_key(), "clb");
        assert_eq!(device.routing[&(1, 1)]["sb"].segbits_key(), "sb_0");
    }

    #[test]
    fn validate_rejects_region_gap() {
        let root = create_fixture_db(&tempdir("region_gap"));
        let mut device = Device::load(&root).unwrap();
        if let Some(region) = device.regions.get_mut(&1) {
            region.offset = 50;
        }
        assert!(matches!(device.validate(), Err(DbError::Integrity(_))));
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let root = create_fixture_db(&tempdir("length_mismatch"));
        let mut device = Device::load(&root).unwrap();
        device.bitstream_size = 100;
        assert!(matches!(device.validate(), Err(DbError::Integrity(_))));
    }

    #[test]
    fn validate_rejects_bits_beyond_region() {
        let root = create_fixture_db(&tempdir("bits_beyond"));
        let mut device = Device::load(&root).unwrap();
        if let Some(tile) = device.tiles.get_mut(&(0, 1)) {
            // Region 1 is 32 bits long; the clb footprint reaches bit 6.
            tile.offset = 26;
        }
        assert!(matches!(device.validate(), Err(DbError::Integrity(_))));
    }

    #[test]
    fn validate_rejects_unindexed_and_indexed_mix() {
        let root = create_fixture_db(&tempdir("mixed_table"));
        fs::write(
            root.join("segbits_clb.db"),
            "LUT_INIT 0\nLUT_INIT[0] 1\nLUT_INIT[1] 2\n",
        )
        .unwrap();
        let err = Device::load(&root).unwrap_err();
        assert!(matches!(err, DbError::Integrity(_)));
        assert!(format!("{err}").contains("mixes"));
    }

    #[test]
    fn validate_rejects_index_gap() {
        let root = create_fixture_db(&tempdir("index_gap"));
        fs::write(root.join("segbits_cbx_0.db"), "ROUTING.EN[0] 0\nROUTING.EN[2] 1\n").unwrap();
        let err = Device::load(&root).unwrap_err();
        assert!(matches!(err, DbError::Integrity(_)));
        assert!(format!("{err}").contains("gap"));
    }

    #[test]
    fn validate_rejects_unknown_routing_kind() {
        let root = create_fixture_db(&tempdir("bad_routing"));
        let descriptor = fs::read_to_string(root.join("device.json"))
            .unwrap()
            .replace("\"cbx\"", "\"zb\"");
        fs::write(root.join("device.json"), descriptor).unwrap();
        assert!(matches!(Device::load(&root), Err(DbError::Integrity(_))));
    }

    #[test]
    fn default_bitstream_reference() {
        let root = create_fixture_db(&tempdir("default_ref"));
        let descriptor = fs::read_to_string(root.join("device.json")).unwrap().replace(
            "\"routing\": [",
            "\"default_bitstream\": {\"file\": \"default.hex\", \"format\": \"4byte\"},\n\"routing\": [",
        );
        fs::write(root.join("device.json"), descriptor).unwrap();

        let device = Device::load(&root).unwrap();
        let reference = device.default_bitstream.as_ref().unwrap();
        assert_eq!(reference.file, "default.hex");
        assert_eq!(reference.format, Format::FourByte);
        assert_eq!(device.default_bitstream_path(), Some(root.join("default.hex")));
    }

    #[test]
    fn save_load_roundtrip() {
        let root = create_fixture_db(&tempdir("save_src"));
        let device = Device::load(&root).unwrap();

        let out = tempdir("save_dst");
        device.save(&out).unwrap();
        let reloaded = Device::load(&out).unwrap();

        assert_eq!(reloaded.bitstream_size, device.bitstream_size);
        assert_eq!(reloaded.regions, device.regions);
        assert_eq!(reloaded.tiles, device.tiles);
        assert_eq!(reloaded.routing, device.routing);
        assert_eq!(reloaded.features, device.features);
    }

    #[test]
    fn format_serde_names() {
        assert_eq!(serde_json::to_string(&Format::Text).unwrap(), "\"txt\"");
        assert_eq!(serde_json::to_string(&Format::FourByte).unwrap(), "\"4byte\"");
        let parsed: Format = serde_json::from_str("\"4byte\"").unwrap();
        assert_eq!(parsed, Format::FourByte);
    }
}
