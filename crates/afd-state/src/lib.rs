//! afd-state
//!
//! Persisted per-device NSR watermarks.
//!
//! On disk the store is one pretty-printed JSON object keyed by device id:
//!
//! ```json
//! {
//!   "1": { "last_nsr": 102, "updated_at_utc": "2025-04-08T15:40:00Z" }
//! }
//! ```
//!
//! Commits are max-wins through [`afd_reconcile::advance_watermark`]; a stored
//! watermark never moves backwards. Saves go through a sibling temp file and a
//! rename so a crash mid-write leaves the previous file intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use afd_reconcile::{advance_watermark, DeviceId, WatermarkAdvance};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of [`WatermarkStore::commit`].
pub type CommitOutcome = WatermarkAdvance;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkEntry {
    pub last_nsr: u64,
    pub updated_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkStore {
    entries: BTreeMap<DeviceId, WatermarkEntry>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "watermark store not found, starting empty");
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read watermark store failed: {}", path.display()))?;
        let store = Self::from_json_str(&raw)
            .with_context(|| format!("parse watermark store failed: {}", path.display()))?;
        debug!(path = %path.display(), devices = store.len(), "watermark store loaded");
        Ok(store)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let on_disk: BTreeMap<String, WatermarkEntry> =
            serde_json::from_str(raw).context("watermark store is not a JSON object")?;

        let mut entries = BTreeMap::new();
        for (key, entry) in on_disk {
            let id = key
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(DeviceId::new)
                .with_context(|| format!("invalid device id key in watermark store: {key:?}"))?;
            entries.insert(id, entry);
        }
        Ok(Self { entries })
    }

    pub fn to_json_string(&self) -> Result<String> {
        let on_disk: BTreeMap<String, &WatermarkEntry> = self
            .entries
            .iter()
            .map(|(id, e)| (id.to_string(), e))
            .collect();
        let json = serde_json::to_string_pretty(&on_disk).context("serialize watermark store failed")?;
        Ok(format!("{json}\n"))
    }

    /// Write atomically: `<path>.tmp` then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create state dir failed: {}", parent.display()))?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, self.to_json_string()?)
            .with_context(|| format!("write watermark temp file failed: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replace watermark store failed: {}", path.display()))?;
        debug!(path = %path.display(), devices = self.len(), "watermark store saved");
        Ok(())
    }

    pub fn get(&self, device: DeviceId) -> Option<&WatermarkEntry> {
        self.entries.get(&device)
    }

    pub fn last_nsr(&self, device: DeviceId) -> Option<u64> {
        self.entries.get(&device).map(|e| e.last_nsr)
    }

    /// First NSR to request from `device`: one past the watermark, or 1 for a
    /// device never synced.
    pub fn start_nsr(&self, device: DeviceId) -> u64 {
        self.last_nsr(device)
            .map(|n| n.saturating_add(1))
            .unwrap_or(1)
    }

    /// Offer `candidate` as the new watermark. Only a strictly greater value
    /// replaces the stored one.
    pub fn commit(&mut self, device: DeviceId, candidate: u64, now: DateTime<Utc>) -> CommitOutcome {
        let outcome = advance_watermark(self.last_nsr(device), candidate);
        if let WatermarkAdvance::Advanced { to, .. } = outcome {
            self.entries.insert(
                device,
                WatermarkEntry {
                    last_nsr: to,
                    updated_at_utc: now,
                },
            );
        }
        outcome
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &WatermarkEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "watermarks".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(n: i64) -> DeviceId {
        DeviceId::new(n).unwrap()
    }

    #[test]
    fn start_nsr_is_one_past_watermark() {
        let mut s = WatermarkStore::new();
        assert_eq!(s.start_nsr(dev(1)), 1);
        s.commit(dev(1), 41, Utc::now());
        assert_eq!(s.start_nsr(dev(1)), 42);
    }

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(
            temp_path(Path::new("/var/lib/afd/nsr.json")),
            PathBuf::from("/var/lib/afd/nsr.json.tmp")
        );
    }

    #[test]
    fn bad_keys_are_rejected() {
        let raw = r#"{ "0": { "last_nsr": 1, "updated_at_utc": "2025-01-01T00:00:00Z" } }"#;
        assert!(WatermarkStore::from_json_str(raw).is_err());
        let raw = r#"{ "abc": { "last_nsr": 1, "updated_at_utc": "2025-01-01T00:00:00Z" } }"#;
        assert!(WatermarkStore::from_json_str(raw).is_err());
    }
}
