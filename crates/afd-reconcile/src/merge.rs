//! Roster merge and upload chunking.
//!
//! # Selection
//!
//! A roster line is a candidate only if its employee key has an entry in the
//! [`AuthoritativeMap`]. When several devices carry a line for the same key,
//! the first one encountered is kept unless a later line comes from the
//! device that owns the employee's authoritative record, which overwrites it.
//! Roster ownership follows attendance ownership, not roster freshness.
//!
//! # Chunking
//!
//! Selected lines are packed greedily, joined by `\n`, into chunks of at
//! most `max_chunk_len` characters. A line is never split: one longer than
//! the limit becomes an oversized chunk on its own. Lengths are counted in
//! characters because the device charset is single-byte.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::csv::extract_key;
use crate::{AuthoritativeMap, DeviceId, EmployeeKey, RosterExport};

/// Default upload chunk size accepted by the devices.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 2000;

/// A roster line chosen for an employee, with the device it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedLine {
    pub device_id: DeviceId,
    pub line: String,
}

/// Canonical roster ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedRoster {
    pub header: String,
    /// Selected lines ordered by employee key.
    pub selected: BTreeMap<EmployeeKey, SelectedLine>,
    /// Upload bodies without the header. Empty means nothing to write.
    pub chunks: Vec<String>,
}

impl MergedRoster {
    /// `true` when no roster line was selected.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Upload payloads: each chunk prefixed with the shared header.
    pub fn payloads(&self) -> Vec<String> {
        self.chunks
            .iter()
            .map(|c| format!("{}\n{}", self.header, c))
            .collect()
    }
}

/// Result of [`merge_rosters`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No export carried a header; there is no schema to write against.
    NothingToMerge,
    Merged(MergedRoster),
}

impl MergeOutcome {
    pub fn merged(&self) -> Option<&MergedRoster> {
        match self {
            MergeOutcome::Merged(m) => Some(m),
            MergeOutcome::NothingToMerge => None,
        }
    }
}

/// Pick one roster line per relevant employee across all exports.
///
/// Lines whose key cannot be extracted, or whose employee has no
/// authoritative record this cycle, are dropped.
pub fn select_lines(
    exports: &[RosterExport],
    authoritative: &AuthoritativeMap,
) -> BTreeMap<EmployeeKey, SelectedLine> {
    let mut selected: BTreeMap<EmployeeKey, SelectedLine> = BTreeMap::new();

    for export in exports {
        for line in &export.lines {
            let Some(key) = extract_key(line) else {
                continue;
            };
            let Some(owner) = authoritative.owner_of(&key) else {
                continue;
            };

            let candidate = SelectedLine {
                device_id: export.device_id,
                line: line.clone(),
            };
            match selected.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                Entry::Occupied(mut slot) => {
                    if export.device_id == owner {
                        slot.insert(candidate);
                    }
                }
            }
        }
    }

    selected
}

/// Merge with [`DEFAULT_MAX_CHUNK_LEN`].
pub fn merge_rosters(exports: &[RosterExport], authoritative: &AuthoritativeMap) -> MergeOutcome {
    merge_rosters_with_limit(exports, authoritative, DEFAULT_MAX_CHUNK_LEN)
}

/// Build the canonical roster and split it into upload chunks.
///
/// The header comes from the first export that has one; all devices are
/// assumed to share a schema.
pub fn merge_rosters_with_limit(
    exports: &[RosterExport],
    authoritative: &AuthoritativeMap,
    max_chunk_len: usize,
) -> MergeOutcome {
    let Some(header) = exports
        .iter()
        .map(|e| e.header.as_str())
        .find(|h| !h.trim().is_empty())
    else {
        return MergeOutcome::NothingToMerge;
    };

    let selected = select_lines(exports, authoritative);
    let chunks = chunk_lines(selected.values().map(|s| s.line.as_str()), max_chunk_len);

    MergeOutcome::Merged(MergedRoster {
        header: header.to_string(),
        selected,
        chunks,
    })
}

/// Greedy line packing; see the module docs.
pub fn chunk_lines<'a, I>(lines: I, max_chunk_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunks: Vec<String> = Vec::new();
    // (text, length in chars)
    let mut current: Option<(String, usize)> = None;

    for line in lines {
        let line_len = line.chars().count();
        current = match current.take() {
            None => Some((line.to_string(), line_len)),
            Some((mut text, len)) => {
                if len + 1 + line_len <= max_chunk_len {
                    text.push('\n');
                    text.push_str(line);
                    Some((text, len + 1 + line_len))
                } else {
                    chunks.push(text);
                    Some((line.to_string(), line_len))
                }
            }
        };
    }

    if let Some((text, _)) = current {
        chunks.push(text);
    }
    chunks
}
