//! FASM text parser.
//!
//! Accepts the line-oriented FASM surface syntax and produces
//! [`SetFeature`] records:
//!
//! ```text
//! fpga_top.grid_clb_0__0_.FF.ENABLE            # implicit = 1
//! fpga_top.grid_clb_0__0_.MODE = 1'b1
//! fpga_top.grid_clb_0__0_.LUT_INIT[2] = 1'b0
//! fpga_top.grid_clb_0__0_.LUT_INIT[3:0] = 4'hA
//! fpga_top.sb_0__0_.ROUTING.SEL0 { .attr = "x" }
//! ```
//!
//! Comments (`#` to end of line) and `{ … }` annotation blocks are accepted
//! and discarded. Values take the Verilog-style `<width>'<base><digits>`
//! form with binary, hex, decimal, and octal bases, or a plain decimal
//! integer; `_` digit separators are allowed.

use crate::error::FasmError;
use crate::record::SetFeature;
use regex::Regex;

/// Left-hand-side shape: dotted feature path with an optional `[hi]` or
/// `[hi:lo]` suffix.
const LHS_RE: &str =
    r"^(?P<name>[A-Za-z_][A-Za-z0-9_.]*)(\[(?P<hi>[0-9]+)(:(?P<lo>[0-9]+))?\])?$";

/// Parses a complete FASM document into set-feature records.
///
/// Blank lines and comment-only lines produce no record.
///
/// # Errors
///
/// [`FasmError::Parse`] naming the 1-based line number and quoting the
/// offending line.
pub fn parse_fasm(content: &str) -> Result<Vec<SetFeature>, FasmError> {
    let lhs = Regex::new(LHS_RE).expect("invalid FASM lhs regex");
    let mut records = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        if let Some(record) = parse_line(&lhs, raw, index + 1)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parses one FASM line; returns `None` for blank and comment-only lines.
fn parse_line(lhs: &Regex, raw: &str, line_no: usize) -> Result<Option<SetFeature>, FasmError> {
    let original = raw.trim().to_string();
    let parse_err = |message: String| FasmError::Parse {
        line_no,
        message,
        line: original.clone(),
    };

    // Strip comments, then trailing annotations.
    let mut code = match raw.find('#') {
        Some(position) => &raw[..position],
        None => raw,
    };
    if let Some(position) = code.find('{') {
        if !code.trim_end().ends_with('}') {
            return Err(parse_err("unterminated annotation block".to_string()));
        }
        code = &code[..position];
    }
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }

    let (lhs_text, value_text) = match code.split_once('=') {
        Some((left, right)) => (left.trim(), Some(right.trim())),
        None => (code, None),
    };

    let caps = lhs
        .captures(lhs_text)
        .ok_or_else(|| parse_err(format!("malformed feature reference '{lhs_text}'")))?;
    let feature = caps["name"].to_string();

    let (start, end) = match caps.name("hi") {
        Some(hi) => {
            let hi: u32 = hi
                .as_str()
                .parse()
                .map_err(|e| parse_err(format!("invalid index: {e}")))?;
            match caps.name("lo") {
                Some(lo) => {
                    let lo: u32 = lo
                        .as_str()
                        .parse()
                        .map_err(|e| parse_err(format!("invalid index: {e}")))?;
                    if lo > hi {
                        return Err(parse_err(format!("descending range [{hi}:{lo}]")));
                    }
                    (Some(lo), Some(hi))
                }
                None => (Some(hi), None),
            }
        }
        None => (None, None),
    };

    let value = match value_text {
        Some(text) => parse_value(text).map_err(|message| parse_err(message))?,
        None => 1,
    };

    Ok(Some(SetFeature {
        feature,
        start,
        end,
        value,
        line: original,
    }))
}

/// Parses a FASM value expression: `<width>'<base><digits>` or a plain
/// decimal integer.
fn parse_value(text: &str) -> Result<u64, String> {
    match text.split_once('\'') {
        Some((width_text, based)) => {
            let width: u32 = width_text
                .trim()
                .parse()
                .map_err(|e| format!("invalid value width '{width_text}': {e}"))?;
            let mut chars = based.chars();
            let base = chars
                .next()
                .ok_or_else(|| "missing base after '".to_string())?;
            let radix = match base.to_ascii_lowercase() {
                'b' => 2,
                'h' => 16,
                'd' => 10,
                'o' => 8,
                other => return Err(format!("unknown value base '{other}'")),
            };
            let digits: String = chars.as_str().trim().replace('_', "");
            if digits.is_empty() {
                return Err("missing value digits".to_string());
            }
            let value = u64::from_str_radix(&digits, radix)
                .map_err(|e| format!("invalid value digits '{digits}': {e}"))?;
            if width < 64 && value >> width != 0 {
                return Err(format!("value {value} does not fit in {width} bits"));
            }
            Ok(value)
        }
        None => text
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid value '{text}': {e}")),
    }
}
