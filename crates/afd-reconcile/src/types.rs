use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroI64;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::csv::split_csv;

/// Identifies one time-clock device.
///
/// Zero is not a valid device id, so an invalid id cannot reach the parser.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(NonZeroI64);

impl DeviceId {
    /// `None` for zero.
    pub fn new(raw: i64) -> Option<Self> {
        NonZeroI64::new(raw).map(Self)
    }

    pub fn get(self) -> i64 {
        self.0.get()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric employee identifier (CPF). Leading zeros are not significant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeKey(pub u64);

impl EmployeeKey {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EmployeeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attendance-log operation code (byte 34 of a punch line).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// `I`: new punch.
    #[serde(rename = "I")]
    Insert,
    /// `E`: exclusion.
    #[serde(rename = "E")]
    Exclude,
    /// `A`: alteration.
    #[serde(rename = "A")]
    Alter,
}

impl Operation {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Operation::Insert),
            "E" => Some(Operation::Exclude),
            "A" => Some(Operation::Alter),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Operation::Insert => "I",
            Operation::Exclude => "E",
            Operation::Alter => "A",
        }
    }
}

/// One validated attendance-log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub device_id: DeviceId,
    pub employee_key: EmployeeKey,
    pub operation: Operation,
    /// Punch time with the device's UTC offset. Ordering compares instants.
    pub timestamp: DateTime<FixedOffset>,
    /// Sequence number (NSR). Only comparable within one device's log.
    pub nsr: u64,
    /// The line exactly as it was handed to the parser.
    pub raw_line: String,
}

/// Prepared attendance-log lines fetched from one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceBatch {
    pub device_id: DeviceId,
    pub lines: Vec<String>,
}

impl DeviceBatch {
    pub fn new<I, S>(device_id: DeviceId, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_id,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Roster export of one device, already split into header and data lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterExport {
    pub device_id: DeviceId,
    pub header: String,
    pub lines: Vec<String>,
}

impl RosterExport {
    /// Split a decoded roster export (see [`split_csv`]).
    pub fn from_text(device_id: DeviceId, text: &str) -> Self {
        let split = split_csv(text);
        Self {
            device_id,
            header: split.header,
            lines: split.lines,
        }
    }
}

/// Latest valid record per employee across every device of one cycle.
///
/// Built by [`crate::Resolver`]; read-only for everyone else.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthoritativeMap {
    entries: HashMap<EmployeeKey, AttendanceRecord>,
}

impl AuthoritativeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut HashMap<EmployeeKey, AttendanceRecord> {
        &mut self.entries
    }

    pub fn get(&self, key: &EmployeeKey) -> Option<&AttendanceRecord> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &EmployeeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Device that recorded the employee's most recent activity.
    pub fn owner_of(&self, key: &EmployeeKey) -> Option<DeviceId> {
        self.entries.get(key).map(|r| r.device_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unordered iteration.
    pub fn records(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.entries.values()
    }

    /// Records ordered by employee key, for logs and reports.
    pub fn sorted_records(&self) -> Vec<&AttendanceRecord> {
        let mut out: Vec<&AttendanceRecord> = self.entries.values().collect();
        out.sort_by_key(|r| r.employee_key);
        out
    }
}
