//! Parser for the fabric-dependent bitstream XML dump.
//!
//! The dump is produced at fabric-generation time and lists every
//! configuration bit of the device with its scan-chain region, chain
//! position, and full feature path:
//!
//! ```text
//! <fabric_bitstream>
//!   <region id="0">
//!     <bit id="0" path="fpga_top.grid_clb_0__0_.LUT_INIT[0]"/>
//!     <bit id="1" path="fpga_top.grid_clb_0__0_.LUT_INIT[1]"/>
//!   </region>
//! </fabric_bitstream>
//! ```
//!
//! Word-line/bit-line and frame-addressed fabrics mark their bits with
//! `<wl>`, `<bl>`, or `<frame>` children; those configuration styles are
//! rejected up front.

use crate::error::BuildError;

/// One configuration bit from the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricBit {
    /// Scan-chain region the bit belongs to.
    pub region: u32,
    /// Global chain position of the bit.
    pub id: u32,
    /// Full dotted feature path, `fpga_top.<block-tag>.<local>`.
    pub path: String,
}

/// Child elements that mark non-scan-chain configuration styles.
const NON_SCAN_CHAIN_MARKS: &[&str] = &["wl", "bl", "frame"];

/// Parses a fabric bitstream XML document into its bit list.
///
/// # Errors
///
/// [`BuildError::Parse`] for malformed XML or missing attributes;
/// [`BuildError::Unsupported`] when a bit carries a word-line, bit-line,
/// or frame mark.
pub fn parse_fabric_xml(content: &str) -> Result<Vec<FabricBit>, BuildError> {
    let doc = roxmltree::Document::parse(content)
        .map_err(|e| BuildError::Parse(format!("fabric XML: {e}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "fabric_bitstream" {
        return Err(BuildError::Parse(format!(
            "root element is '{}', expected 'fabric_bitstream'",
            root.tag_name().name()
        )));
    }

    let mut bits = Vec::new();
    for region in root.children().filter(|n| n.is_element()) {
        if region.tag_name().name() != "region" {
            return Err(BuildError::Parse(format!(
                "unexpected element '{}' under fabric_bitstream",
                region.tag_name().name()
            )));
        }
        let region_id: u32 = region
            .attribute("id")
            .ok_or_else(|| BuildError::Parse("region without an id attribute".to_string()))?
            .parse()
            .map_err(|e| BuildError::Parse(format!("invalid region id: {e}")))?;

        for bit in region.children().filter(|n| n.is_element()) {
            if bit.tag_name().name() != "bit" {
                return Err(BuildError::Parse(format!(
                    "unexpected element '{}' under region {region_id}",
                    bit.tag_name().name()
                )));
            }
            for child in bit.children().filter(|n| n.is_element()) {
                if NON_SCAN_CHAIN_MARKS.contains(&child.tag_name().name()) {
                    return Err(BuildError::Unsupported(format!(
                        "bit carries a '{}' mark; only scan-chain fabrics are handled",
                        child.tag_name().name()
                    )));
                }
            }

            let id: u32 = bit
                .attribute("id")
                .ok_or_else(|| {
                    BuildError::Parse(format!("bit without an id attribute in region {region_id}"))
                })?
                .parse()
                .map_err(|e| BuildError::Parse(format!("invalid bit id: {e}")))?;
            let path = bit
                .attribute("path")
                .ok_or_else(|| {
                    BuildError::Parse(format!("bit {id} in region {region_id} has no path"))
                })?
                .to_string();

            bits.push(FabricBit {
                region: region_id,
                id,
                path,
            });
        }
    }
    Ok(bits)
}
