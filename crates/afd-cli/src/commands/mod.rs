//! Command handler modules for the `afd` binary.
//!
//! Shared helpers live here; command logic lives in the submodules.

pub mod inspect;
pub mod sync;

use std::fs;
use std::path::Path;

use afd_reconcile::DeviceId;
use anyhow::{Context, Result};

/// Parse a CLI device id. Zero is not a device.
pub fn parse_device_id(raw: i64) -> Result<DeviceId> {
    DeviceId::new(raw).with_context(|| format!("invalid --device {raw}: device ids are non-zero"))
}

/// Read a file the clocks produced and decode it from Windows-1252.
pub fn read_device_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read failed: {}", path.display()))?;
    Ok(afd_device::charset::decode(&bytes))
}
