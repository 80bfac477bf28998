use std::collections::hash_map::Entry;
use std::collections::BTreeMap;

use crate::parser::{parse_record, MalformedLine};
use crate::{AttendanceRecord, AuthoritativeMap, DeviceBatch, DeviceId};

/// What folding one record did to the authoritative map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldOutcome {
    /// First record seen for this employee.
    Inserted,
    /// Strictly newer than the previous entry; replaced it.
    Replaced,
    /// Same or older timestamp; the existing entry stays.
    Kept,
}

/// Per-device line counters for one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub lines: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Line counters for every device folded into a [`Resolver`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub per_device: BTreeMap<DeviceId, DeviceStats>,
}

impl ResolveStats {
    pub fn total(&self) -> DeviceStats {
        self.per_device
            .values()
            .fold(DeviceStats::default(), |acc, s| DeviceStats {
                lines: acc.lines + s.lines,
                accepted: acc.accepted + s.accepted,
                rejected: acc.rejected + s.rejected,
            })
    }
}

/// Incremental latest-record-per-employee fold.
///
/// Batches may be folded one at a time as devices answer or all at once;
/// for the same encounter order the resulting map is identical. Encounter
/// order is batch order, then line order within a batch. It only matters on
/// exact timestamp ties, where the record seen first stays.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    map: AuthoritativeMap,
    stats: ResolveStats,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and fold every line of `batch`. Malformed lines are counted and skipped.
    pub fn fold_batch(&mut self, batch: &DeviceBatch) {
        for line in &batch.lines {
            // Rejections are already counted in the stats.
            let _ = self.fold_line(batch.device_id, line);
        }
        // A device that answered with nothing still shows up in the stats.
        self.stats.per_device.entry(batch.device_id).or_default();
    }

    /// Parse and fold a single line. A rejected line is counted and its
    /// reason handed back.
    pub fn fold_line(&mut self, device_id: DeviceId, line: &str) -> Result<FoldOutcome, MalformedLine> {
        let parsed = parse_record(line, device_id);
        let stats = self.stats.per_device.entry(device_id).or_default();
        stats.lines += 1;
        match parsed {
            Ok(record) => {
                stats.accepted += 1;
                Ok(self.fold_record(record))
            }
            Err(reason) => {
                stats.rejected += 1;
                Err(reason)
            }
        }
    }

    /// Fold an already-parsed record. A strictly later timestamp wins.
    pub fn fold_record(&mut self, record: AttendanceRecord) -> FoldOutcome {
        match self.map.entries_mut().entry(record.employee_key) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                FoldOutcome::Inserted
            }
            Entry::Occupied(mut slot) => {
                if record.timestamp > slot.get().timestamp {
                    slot.insert(record);
                    FoldOutcome::Replaced
                } else {
                    FoldOutcome::Kept
                }
            }
        }
    }

    pub fn map(&self) -> &AuthoritativeMap {
        &self.map
    }

    pub fn stats(&self) -> &ResolveStats {
        &self.stats
    }

    pub fn finish(self) -> AuthoritativeMap {
        self.map
    }

    pub fn finish_with_stats(self) -> (AuthoritativeMap, ResolveStats) {
        (self.map, self.stats)
    }
}

/// One-shot resolution over batches in the order given.
pub fn resolve(batches: &[DeviceBatch]) -> AuthoritativeMap {
    let mut resolver = Resolver::new();
    for batch in batches {
        resolver.fold_batch(batch);
    }
    resolver.finish()
}
