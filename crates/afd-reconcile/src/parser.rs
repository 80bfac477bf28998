//! Fixed-width AFD punch-line parser.
//!
//! # Column layout (0-indexed, end-exclusive)
//!
//! | Field         | Range      | Rule                                        |
//! |---------------|------------|---------------------------------------------|
//! | NSR           | `[0, 9)`   | 9 ASCII digits                              |
//! | record type   | `[9, 10)`  | literal `5` (punch / attendance event)      |
//! | timestamp     | `[10, 34)` | `YYYY-MM-DDTHH:MM:SS±hhmm`                  |
//! | operation     | `[34, 35)` | one of `A`, `E`, `I`                        |
//! | (separator)   | `[35, 36)` | not inspected                               |
//! | employee key  | `[36, 47)` | 11 ASCII digits                             |
//!
//! Anything past column 47 (name, CRC) is kept in `raw_line` and ignored.
//! A line either passes every check or is rejected as a whole.

use std::fmt;
use std::ops::Range;

use chrono::DateTime;

use crate::{AttendanceRecord, DeviceId, EmployeeKey, Operation};

/// Minimum length of a parseable punch line.
pub const RECORD_MIN_LEN: usize = 47;

const NSR: Range<usize> = 0..9;
const RECORD_TYPE: Range<usize> = 9..10;
const TIMESTAMP: Range<usize> = 10..34;
const OPERATION: Range<usize> = 34..35;
const EMPLOYEE_KEY: Range<usize> = 36..47;

const PUNCH_RECORD_TYPE: &str = "5";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Segments at the tail of a device AFD response that are never records
/// (the dump's filename and the remnant after the last terminator).
const FOOTER_SEGMENTS: usize = 2;

// ---------------------------------------------------------------------------
// Rejection reasons
// ---------------------------------------------------------------------------

/// Why a line was not accepted as an [`AttendanceRecord`].
///
/// Rejection is a normal data-quality outcome: callers count and skip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MalformedLine {
    /// Fewer than [`RECORD_MIN_LEN`] bytes.
    TooShort { len: usize },
    /// A fixed column does not fall on a character boundary.
    NotAscii,
    /// NSR field is not 9 digits.
    Nsr { raw: String },
    /// Record-type byte is not `5`.
    RecordType { raw: String },
    /// Timestamp field does not parse with an explicit offset.
    Timestamp { raw: String },
    /// Operation byte is not one of `A`, `E`, `I`.
    Operation { raw: String },
    /// Employee-key field is not 11 digits.
    EmployeeKey { raw: String },
}

impl fmt::Display for MalformedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedLine::TooShort { len } => {
                write!(f, "line too short: {len} < {RECORD_MIN_LEN}")
            }
            MalformedLine::NotAscii => write!(f, "fixed-width columns are not ascii"),
            MalformedLine::Nsr { raw } => write!(f, "invalid nsr '{raw}'"),
            MalformedLine::RecordType { raw } => write!(f, "not a punch record (type '{raw}')"),
            MalformedLine::Timestamp { raw } => write!(f, "invalid timestamp '{raw}'"),
            MalformedLine::Operation { raw } => write!(f, "invalid operation '{raw}'"),
            MalformedLine::EmployeeKey { raw } => write!(f, "invalid employee key '{raw}'"),
        }
    }
}

impl std::error::Error for MalformedLine {}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn column(line: &str, range: Range<usize>) -> Result<&str, MalformedLine> {
    line.get(range).ok_or(MalformedLine::NotAscii)
}

/// `YYYY-MM-DDTHH:MM:SS±hhmm`, checked position by position. The chrono
/// format alone tolerates padding, signed years and short years.
fn timestamp_shape_ok(raw: &str) -> bool {
    let b = raw.as_bytes();
    b.len() == TIMESTAMP.len()
        && b.iter().enumerate().all(|(i, &c)| match i {
            4 | 7 => c == b'-',
            10 => c == b'T',
            13 | 16 => c == b':',
            19 => c == b'+' || c == b'-',
            _ => c.is_ascii_digit(),
        })
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse one punch line recorded by `device_id`.
///
/// Parsing the same line twice yields equal records.
pub fn parse_record(raw_line: &str, device_id: DeviceId) -> Result<AttendanceRecord, MalformedLine> {
    if raw_line.len() < RECORD_MIN_LEN {
        return Err(MalformedLine::TooShort {
            len: raw_line.len(),
        });
    }

    let nsr_raw = column(raw_line, NSR)?;
    let nsr = if all_digits(nsr_raw) {
        nsr_raw.parse::<u64>().ok()
    } else {
        None
    }
    .ok_or_else(|| MalformedLine::Nsr {
        raw: nsr_raw.to_string(),
    })?;

    let record_type = column(raw_line, RECORD_TYPE)?;
    if record_type != PUNCH_RECORD_TYPE {
        return Err(MalformedLine::RecordType {
            raw: record_type.to_string(),
        });
    }

    let ts_raw = column(raw_line, TIMESTAMP)?;
    let timestamp = if timestamp_shape_ok(ts_raw) {
        DateTime::parse_from_str(ts_raw, TIMESTAMP_FORMAT).ok()
    } else {
        None
    }
    .ok_or_else(|| MalformedLine::Timestamp {
        raw: ts_raw.to_string(),
    })?;

    let op_raw = column(raw_line, OPERATION)?;
    let operation = Operation::from_code(op_raw).ok_or_else(|| MalformedLine::Operation {
        raw: op_raw.to_string(),
    })?;

    let key_raw = column(raw_line, EMPLOYEE_KEY)?;
    let employee_key = if all_digits(key_raw) {
        key_raw.parse::<u64>().ok().map(EmployeeKey)
    } else {
        None
    }
    .ok_or_else(|| MalformedLine::EmployeeKey {
        raw: key_raw.to_string(),
    })?;

    Ok(AttendanceRecord {
        device_id,
        employee_key,
        operation,
        timestamp,
        nsr,
        raw_line: raw_line.to_string(),
    })
}

/// `true` when the record-type byte marks an attendance event.
pub fn is_punch_line(line: &str) -> bool {
    line.get(RECORD_TYPE) == Some(PUNCH_RECORD_TYPE)
}

/// Turn a decoded AFD response body into candidate punch lines.
///
/// Drops the trailing footer segments, trims each line (which also strips a
/// `\r` left by `\r\n` terminators), skips blanks and keeps only punch
/// records. Header, company and clock-adjustment records never reach
/// [`parse_record`].
pub fn prepare_log_lines(text: &str) -> Vec<String> {
    let segments: Vec<&str> = text.split('\n').collect();
    let keep = segments.len().saturating_sub(FOOTER_SEGMENTS);

    segments[..keep]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && is_punch_line(l))
        .map(str::to_string)
        .collect()
}
