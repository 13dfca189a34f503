//! Parser for `segbits_*.db` files.
//!
//! Segbits files map feature paths to the configuration bits they program,
//! one feature (or one sub-index of a multi-bit feature) per line:
//!
//! ```text
//! LUT_INIT[0] 0
//! LUT_INIT[1] 1
//! FF.ENABLE 4 !5
//! ```
//!
//! The first token is the feature name with an optional `[index]` suffix;
//! the remaining tokens are bit specifiers in the [`Bit`](crate::Bit) text
//! form. Lines are grouped into a per-feature table mapping the optional
//! sub-index to its pattern, so a four-bit `LUT_INIT` becomes one entry with
//! four indexed patterns.

use crate::bit::{Bit, SegbitPattern};
use crate::error::DbError;
use regex::Regex;
use std::collections::BTreeMap;

/// Grouped segbits for one block kind.
///
/// Maps the feature's local path to its sub-index table. A sub-index of
/// `None` is the "unindexed" entry of a single-bit feature.
pub type FeatureTable = BTreeMap<String, BTreeMap<Option<u32>, SegbitPattern>>;

/// The feature-name token shape: a name free of brackets and whitespace,
/// optionally followed by a bracketed decimal sub-index.
const FEATURE_NAME_RE: &str = r"^(?P<name>[^\[\]\s]+)(\[(?P<idx>[0-9]+)\])?$";

/// Splits a feature-name token into `(name, optional sub-index)`.
pub fn split_feature_name(token: &str) -> Result<(String, Option<u32>), DbError> {
    let re = Regex::new(FEATURE_NAME_RE).expect("invalid feature name regex");
    let caps = re
        .captures(token)
        .ok_or_else(|| DbError::Parse(format!("invalid feature name '{token}'")))?;

    let name = caps["name"].to_string();
    let index = match caps.name("idx") {
        Some(m) => Some(
            m.as_str()
                .parse::<u32>()
                .map_err(|e| DbError::Parse(format!("invalid feature index in '{token}': {e}")))?,
        ),
        None => None,
    };

    Ok((name, index))
}

/// Parses the contents of one segbits file into a [`FeatureTable`].
///
/// Empty lines and lines starting with `#` are skipped.
///
/// # Errors
///
/// Returns [`DbError::Parse`] if a line has a malformed feature name, a
/// malformed bit token, or no bits at all.
pub fn parse_segbits(content: &str) -> Result<FeatureTable, DbError> {
    let mut table = FeatureTable::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let feature = tokens
            .next()
            .ok_or_else(|| DbError::Parse(format!("line {}: empty feature name", line_no + 1)))?;
        let (name, index) = split_feature_name(feature)
            .map_err(|e| DbError::Parse(format!("line {}: {e}", line_no + 1)))?;

        let mut bits = SegbitPattern::new();
        for token in tokens {
            let bit: Bit = token
                .parse()
                .map_err(|e| DbError::Parse(format!("line {}: {e}", line_no + 1)))?;
            bits.push(bit);
        }

        if bits.is_empty() {
            return Err(DbError::Parse(format!(
                "line {}: feature '{feature}' has no bits",
                line_no + 1
            )));
        }

        table.entry(name).or_default().insert(index, bits);
    }

    Ok(table)
}

/// Renders a [`FeatureTable`] back to the segbits file text form.
///
/// Features and sub-indexes are emitted in sorted order so the output is
/// deterministic.
pub fn render_segbits(table: &FeatureTable) -> String {
    let mut out = String::new();
    for (name, patterns) in table {
        for (index, bits) in patterns {
            match index {
                Some(idx) => out.push_str(&format!("{name}[{idx}]")),
                None => out.push_str(name),
            }
            for bit in bits {
                out.push_str(&format!(" {bit}"));
            }
            out.push('\n');
        }
    }
    out
}

/// Returns the on-disk file name for a block kind's segbits table.
pub fn segbits_filename(key: &str) -> String {
    format!("segbits_{key}.db")
}
