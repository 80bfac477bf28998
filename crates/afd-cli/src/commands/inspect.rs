//! Offline inspection commands. No device is contacted.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use afd_reconcile::{
    is_punch_line, prepare_log_lines, split_csv, Resolver, RosterRow, RosterSchema,
};
use afd_state::WatermarkStore;
use anyhow::{bail, Context, Result};
use tracing::warn;

use super::{parse_device_id, read_device_text};

/// `afd parse-afd`: resolve a saved AFD dump and print one JSON record per
/// employee, ordered by key, followed by a counters line.
pub fn parse_afd(device: i64, file: &Path, no_footer: bool) -> Result<()> {
    let device_id = parse_device_id(device)?;
    let text = read_device_text(file)?;

    let lines: Vec<String> = if no_footer {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && is_punch_line(l))
            .map(str::to_string)
            .collect()
    } else {
        prepare_log_lines(&text)
    };

    let mut resolver = Resolver::new();
    for (i, line) in lines.iter().enumerate() {
        if let Err(reason) = resolver.fold_line(device_id, line) {
            warn!(punch_line = i + 1, %reason, "line rejected");
        }
    }
    let (map, stats) = resolver.finish_with_stats();

    for record in map.sorted_records() {
        println!(
            "{}",
            serde_json::to_string(record).context("serialize record failed")?
        );
    }
    let total = stats.total();
    println!(
        "lines={} accepted={} rejected={} employees={}",
        total.lines,
        total.accepted,
        total.rejected,
        map.len()
    );
    Ok(())
}

/// `afd roster-check`: validate every row of a saved roster export against
/// the schema its header declares. Fails when any row is invalid.
///
/// With `normalize`, the header and every valid row are rewritten with the
/// roster escaping rule and saved in the device charset.
pub fn roster_check(file: &Path, normalize: Option<&Path>) -> Result<()> {
    let text = read_device_text(file)?;
    let split = split_csv(&text);
    let schema = RosterSchema::from_header(&split.header)
        .with_context(|| format!("roster header unreadable: {}", file.display()))?;

    let mut valid = 0usize;
    let mut invalid = 0usize;
    let mut keyless = 0usize;
    let mut seen: BTreeMap<u64, usize> = BTreeMap::new();
    let mut rows: Vec<RosterRow> = Vec::new();

    for (i, line) in split.lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        // Line 1 is the header.
        let line_no = i + 2;
        match RosterRow::parse(&schema, line) {
            Ok(row) => {
                valid += 1;
                match row.key() {
                    Some(key) => *seen.entry(key.get()).or_default() += 1,
                    None => {
                        keyless += 1;
                        println!("line {line_no}: no employee key");
                    }
                }
                rows.push(row);
            }
            Err(e) => {
                invalid += 1;
                println!("line {line_no}: {e}");
            }
        }
    }

    let duplicates: Vec<u64> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(k, _)| k)
        .collect();
    for key in &duplicates {
        println!("duplicate key {key}");
    }

    println!(
        "fields={} rows={} valid={} invalid={} keyless={} duplicate_keys={}",
        schema.len(),
        valid + invalid,
        valid,
        invalid,
        keyless,
        duplicates.len()
    );

    if let Some(out) = normalize {
        write_normalized(out, &schema, &rows)?;
        println!("normalized rows={} path={}", rows.len(), out.display());
    }

    if invalid > 0 {
        bail!("ROSTER_INVALID: {invalid} row(s) violate the roster schema");
    }
    Ok(())
}

fn write_normalized(out: &Path, schema: &RosterSchema, rows: &[RosterRow]) -> Result<()> {
    let mut lines = vec![schema.header_line().context("write roster header failed")?];
    for row in rows {
        lines.push(row.to_line().context("write roster row failed")?);
    }
    let bytes = afd_device::charset::encode(&lines.join("\n"))
        .context("normalized roster is not representable in the device charset")?;
    fs::write(out, bytes).with_context(|| format!("write failed: {}", out.display()))
}

/// `afd watermarks`: print the persisted store.
pub fn watermarks(state: &Path) -> Result<()> {
    let store = WatermarkStore::load(state)?;
    if store.is_empty() {
        println!("no watermarks");
        return Ok(());
    }
    for (device_id, entry) in store.iter() {
        println!(
            "device_id={} last_nsr={} next_nsr={} updated_at_utc={}",
            device_id,
            entry.last_nsr,
            store.start_nsr(device_id),
            entry.updated_at_utc.to_rfc3339()
        );
    }
    Ok(())
}
