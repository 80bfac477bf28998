//! Per-device NSR watermarks.
//!
//! # Invariants
//!
//! - **Per device**: NSRs are only comparable within one device's log, so the
//!   candidate watermark is the maximum NSR among that device's records in
//!   the authoritative map, never a global maximum.
//! - **Absent means untouched**: a device with no record in the map has no
//!   candidate; its persisted watermark must not be reset.
//! - **Never decreases**: [`advance_watermark`] only moves forward.
//! - **Pure, no IO**: committing a candidate (and only after that device's
//!   roster push succeeded) is the caller's job.

use std::collections::BTreeMap;

use crate::{AuthoritativeMap, DeviceId};

/// Candidate watermark per device from the authoritative map.
pub fn compute_watermarks(authoritative: &AuthoritativeMap) -> BTreeMap<DeviceId, u64> {
    let mut out: BTreeMap<DeviceId, u64> = BTreeMap::new();
    for record in authoritative.records() {
        out.entry(record.device_id)
            .and_modify(|nsr| *nsr = (*nsr).max(record.nsr))
            .or_insert(record.nsr);
    }
    out
}

/// Result of offering a candidate to a stored watermark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatermarkAdvance {
    /// Candidate was greater (or nothing was stored); the watermark moves.
    Advanced { from: Option<u64>, to: u64 },
    /// Candidate is not greater than the stored value; nothing changes.
    Unchanged { current: u64, candidate: u64 },
}

impl WatermarkAdvance {
    pub fn is_advanced(&self) -> bool {
        matches!(self, WatermarkAdvance::Advanced { .. })
    }

    /// Watermark value after the decision.
    pub fn value(&self) -> u64 {
        match self {
            WatermarkAdvance::Advanced { to, .. } => *to,
            WatermarkAdvance::Unchanged { current, .. } => *current,
        }
    }
}

/// Max-wins decision for one device.
pub fn advance_watermark(current: Option<u64>, candidate: u64) -> WatermarkAdvance {
    match current {
        Some(cur) if candidate <= cur => WatermarkAdvance::Unchanged {
            current: cur,
            candidate,
        },
        _ => WatermarkAdvance::Advanced {
            from: current,
            to: candidate,
        },
    }
}
