//! Roster export splitting and employee-key extraction.
//!
//! The device roster export is a `;`-delimited text blob: one header line
//! followed by one line per configured user. Lines are kept verbatim; only
//! the first field is ever interpreted here.

use crate::EmployeeKey;

/// Field delimiter used by device roster exports.
pub const DEFAULT_SEPARATOR: char = ';';

/// Header plus ordered data lines of a roster export.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitCsv {
    /// Empty when the export was empty.
    pub header: String,
    pub lines: Vec<String>,
}

/// Split a roster export into header and data lines.
///
/// The whole blob is trimmed first, so leading and trailing blank lines
/// disappear; blank lines in the middle survive as empty strings. Both `\n`
/// and `\r\n` terminate a line.
pub fn split_csv(text: &str) -> SplitCsv {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return SplitCsv::default();
    }

    let mut all = trimmed
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string());

    let header = all.next().unwrap_or_default();
    SplitCsv {
        header,
        lines: all.collect(),
    }
}

/// Employee key from the first `;`-separated field of `line`.
pub fn extract_key(line: &str) -> Option<EmployeeKey> {
    extract_key_with(line, DEFAULT_SEPARATOR)
}

/// Employee key from the first `separator`-delimited field of `line`.
///
/// The field is trimmed and must be a non-empty run of ASCII digits that
/// fits in a `u64`. Blank or non-numeric fields yield `None`, never zero.
/// Signs, decimal points and exponents are not digits: `+5`, `1.0` and
/// `1e3` are all `None`, since a CPF is a plain integer.
pub fn extract_key_with(line: &str, separator: char) -> Option<EmployeeKey> {
    let first = line.split(separator).next()?.trim();
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    first.parse::<u64>().ok().map(EmployeeKey)
}
