//! One sync cycle.
//!
//! 1. Load config, resolve credentials, load the watermark store.
//! 2. Collect: per device (bounded by `sync.concurrency`) login, download the
//!    AFD from the device's next NSR, export the roster, logout. Each task
//!    returns its own result; a failed device is logged and left out.
//! 3. Fold in configuration order: resolve, merge rosters, compute candidate
//!    watermarks.
//! 4. Push every payload to every reachable device. A device's watermark is
//!    committed only when all of its payloads were accepted.
//! 5. Save the store and report the summary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use afd_config::credentials::resolve_device_credentials;
use afd_config::{report_unused_keys, SyncConfig, UnusedKeyPolicy};
use afd_device::{
    DeviceClient, DeviceEndpoint, DeviceError, HttpClientOptions, HttpDeviceClient, Session,
};
use afd_reconcile::{
    compute_watermarks, merge_rosters_with_limit, DeviceBatch, DeviceId, MergeOutcome, Resolver,
    RosterExport, RosterSchema, WatermarkAdvance,
};
use afd_state::WatermarkStore;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct CycleOptions {
    pub max_chunk_len: usize,
    pub concurrency: usize,
    pub dry_run: bool,
}

/// Counters for one cycle, printed as JSON on stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub devices_ok: usize,
    pub devices_failed: usize,
    pub lines_accepted: usize,
    pub lines_rejected: usize,
    pub employees_resolved: usize,
    pub chunks: usize,
    pub devices_pushed: usize,
    pub push_failures: usize,
    pub watermarks_committed: usize,
}

/// What one device handed back during collection.
struct Harvest {
    batch: DeviceBatch,
    roster: RosterExport,
}

/// Entry point for `afd sync`.
pub async fn run(config_paths: &[String], dry_run: bool) -> Result<CycleSummary> {
    let cycle_id = Uuid::new_v4();

    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = afd_config::load_layered_yaml(&path_refs)?;

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by sync");
    }

    let cfg = SyncConfig::from_config_json(&loaded.config_json)?;
    let creds = resolve_device_credentials(&cfg)?;

    let endpoints: Vec<DeviceEndpoint> = cfg
        .devices
        .iter()
        .zip(creds)
        .map(|(d, c)| DeviceEndpoint::new(d.id, d.label(), &d.host, c.user, c.password))
        .collect();

    let state_path = PathBuf::from(&cfg.sync.state_path);
    let mut store = WatermarkStore::load(&state_path)?;

    let client: Arc<dyn DeviceClient> = Arc::new(
        HttpDeviceClient::new(HttpClientOptions {
            timeout: Duration::from_secs(cfg.sync.request_timeout_secs),
            accept_invalid_certs: cfg.sync.accept_invalid_certs,
        })
        .map_err(anyhow::Error::new)?,
    );

    info!(
        %cycle_id,
        config_hash = %loaded.config_hash,
        devices = endpoints.len(),
        dry_run,
        "sync cycle start"
    );

    let opts = CycleOptions {
        max_chunk_len: cfg.sync.max_chunk_len,
        concurrency: cfg.sync.concurrency,
        dry_run,
    };
    let summary = run_cycle(client, &endpoints, &mut store, opts, Utc::now()).await?;

    if summary.watermarks_committed > 0 {
        store.save(&state_path)?;
        info!(path = %state_path.display(), "watermarks saved");
    }

    info!(
        %cycle_id,
        devices_ok = summary.devices_ok,
        devices_failed = summary.devices_failed,
        lines_accepted = summary.lines_accepted,
        lines_rejected = summary.lines_rejected,
        employees = summary.employees_resolved,
        chunks = summary.chunks,
        devices_pushed = summary.devices_pushed,
        push_failures = summary.push_failures,
        watermarks_committed = summary.watermarks_committed,
        "sync cycle done"
    );
    Ok(summary)
}

/// Collect, reconcile, push and commit. Mutates `store` in memory only.
pub async fn run_cycle(
    client: Arc<dyn DeviceClient>,
    endpoints: &[DeviceEndpoint],
    store: &mut WatermarkStore,
    opts: CycleOptions,
    now: DateTime<Utc>,
) -> Result<CycleSummary> {
    let mut summary = CycleSummary::default();

    let harvested = collect(&client, endpoints, store, opts.concurrency).await;

    // Configuration order is the canonical encounter order.
    let mut reachable: Vec<DeviceEndpoint> = Vec::new();
    let mut batches: Vec<DeviceBatch> = Vec::new();
    let mut exports: Vec<RosterExport> = Vec::new();
    for (ep, slot) in endpoints.iter().zip(harvested) {
        match slot {
            Some(h) => {
                reachable.push(ep.clone());
                batches.push(h.batch);
                exports.push(h.roster);
            }
            None => summary.devices_failed += 1,
        }
    }
    summary.devices_ok = reachable.len();

    if reachable.is_empty() {
        bail!(
            "SYNC_NO_DEVICES: none of the {} configured device(s) answered",
            endpoints.len()
        );
    }

    let mut resolver = Resolver::new();
    for batch in &batches {
        resolver.fold_batch(batch);
    }
    let (authoritative, stats) = resolver.finish_with_stats();

    for (device_id, s) in &stats.per_device {
        if s.rejected > 0 {
            warn!(%device_id, lines = s.lines, rejected = s.rejected, "malformed log lines skipped");
        } else {
            debug!(%device_id, lines = s.lines, accepted = s.accepted, "log lines folded");
        }
    }
    let total = stats.total();
    summary.lines_accepted = total.accepted;
    summary.lines_rejected = total.rejected;
    summary.employees_resolved = authoritative.len();

    warn_on_schema_drift(&exports);

    let candidates = compute_watermarks(&authoritative);

    let merged = match merge_rosters_with_limit(&exports, &authoritative, opts.max_chunk_len) {
        MergeOutcome::Merged(m) => m,
        MergeOutcome::NothingToMerge => {
            warn!("no device exported a roster header; nothing pushed, watermarks held");
            return Ok(summary);
        }
    };
    summary.chunks = merged.chunks.len();
    info!(
        employees = merged.selected.len(),
        chunks = merged.chunks.len(),
        "roster merged"
    );

    if opts.dry_run {
        info!(candidates = ?candidates, "dry run: roster not pushed, watermarks not committed");
        return Ok(summary);
    }

    let pushed: BTreeMap<DeviceId, bool> = if merged.is_empty() {
        // Nothing to write; every reachable device trivially succeeded.
        reachable.iter().map(|ep| (ep.device_id, true)).collect()
    } else {
        let payloads = Arc::new(merged.payloads());
        let outcome = push(&client, &reachable, payloads, opts.concurrency).await;
        summary.devices_pushed = outcome.values().filter(|ok| **ok).count();
        outcome
    };

    for ep in &reachable {
        if !pushed.get(&ep.device_id).copied().unwrap_or(false) {
            summary.push_failures += 1;
            continue;
        }
        let Some(&candidate) = candidates.get(&ep.device_id) else {
            continue;
        };
        match store.commit(ep.device_id, candidate, now) {
            WatermarkAdvance::Advanced { from, to } => {
                summary.watermarks_committed += 1;
                info!(device_id = %ep.device_id, from = ?from, to, "watermark advanced");
            }
            WatermarkAdvance::Unchanged { current, candidate } => {
                debug!(device_id = %ep.device_id, current, candidate, "watermark unchanged");
            }
        }
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// One slot per endpoint, in endpoint order. `None` for a failed device.
async fn collect(
    client: &Arc<dyn DeviceClient>,
    endpoints: &[DeviceEndpoint],
    store: &WatermarkStore,
    concurrency: usize,
) -> Vec<Option<Harvest>> {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (idx, ep) in endpoints.iter().cloned().enumerate() {
        let client = Arc::clone(client);
        let sem = Arc::clone(&sem);
        let start_nsr = store.start_nsr(ep.device_id);
        set.spawn(async move {
            let outcome = match sem.acquire_owned().await {
                Ok(_permit) => harvest_device(client.as_ref(), &ep, start_nsr).await,
                Err(_) => Err(DeviceError::Transport("device semaphore closed".to_string())),
            };
            (idx, outcome)
        });
    }

    let mut slots: Vec<Option<Harvest>> = endpoints.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, Ok(harvest))) => slots[idx] = Some(harvest),
            Ok((idx, Err(e))) => {
                let ep = &endpoints[idx];
                warn!(device_id = %ep.device_id, device = %ep.label, error = %e, "device excluded from cycle");
            }
            Err(e) => warn!(error = %e, "device task aborted"),
        }
    }
    slots
}

async fn harvest_device(
    client: &dyn DeviceClient,
    ep: &DeviceEndpoint,
    start_nsr: u64,
) -> Result<Harvest, DeviceError> {
    info!(device_id = %ep.device_id, device = %ep.label, start_nsr, "collecting device");
    let session = client.login(ep).await?;
    let fetched = fetch_with_session(client, &session, start_nsr).await;
    close_session(client, &session).await;
    let (lines, roster_text) = fetched?;

    let roster = RosterExport::from_text(ep.device_id, &roster_text);
    info!(
        device_id = %ep.device_id,
        punch_lines = lines.len(),
        roster_lines = roster.lines.len(),
        "device collected"
    );
    Ok(Harvest {
        batch: DeviceBatch::new(ep.device_id, lines),
        roster,
    })
}

async fn fetch_with_session(
    client: &dyn DeviceClient,
    session: &Session,
    start_nsr: u64,
) -> Result<(Vec<String>, String), DeviceError> {
    let lines = client.fetch_afd(session, start_nsr).await?;
    let roster = client.export_roster(session).await?;
    Ok((lines, roster))
}

async fn close_session(client: &dyn DeviceClient, session: &Session) {
    if let Err(e) = client.logout(session).await {
        warn!(device_id = %session.device_id(), error = %e, "logout failed");
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Push every payload to every endpoint. `true` when all of a device's
/// payloads were accepted.
async fn push(
    client: &Arc<dyn DeviceClient>,
    endpoints: &[DeviceEndpoint],
    payloads: Arc<Vec<String>>,
    concurrency: usize,
) -> BTreeMap<DeviceId, bool> {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for ep in endpoints.iter().cloned() {
        let client = Arc::clone(client);
        let sem = Arc::clone(&sem);
        let payloads = Arc::clone(&payloads);
        set.spawn(async move {
            let outcome = match sem.acquire_owned().await {
                Ok(_permit) => push_device(client.as_ref(), &ep, &payloads).await,
                Err(_) => Err(DeviceError::Transport("device semaphore closed".to_string())),
            };
            (ep, outcome)
        });
    }

    let mut out: BTreeMap<DeviceId, bool> =
        endpoints.iter().map(|ep| (ep.device_id, false)).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((ep, Ok(n))) => {
                info!(device_id = %ep.device_id, device = %ep.label, chunks = n, "roster pushed");
                out.insert(ep.device_id, true);
            }
            Ok((ep, Err(e))) => {
                warn!(device_id = %ep.device_id, device = %ep.label, error = %e, "roster push failed; watermark held");
            }
            Err(e) => warn!(error = %e, "push task aborted"),
        }
    }
    out
}

/// Stops at the first rejected payload.
async fn push_device(
    client: &dyn DeviceClient,
    ep: &DeviceEndpoint,
    payloads: &[String],
) -> Result<usize, DeviceError> {
    let session = client.login(ep).await?;
    let mut result = Ok(0);
    for (i, payload) in payloads.iter().enumerate() {
        if let Err(e) = client.import_roster(&session, payload).await {
            warn!(device_id = %ep.device_id, chunk = i, error = %e, "chunk rejected");
            result = Err(e);
            break;
        }
        result = Ok(i + 1);
    }
    close_session(client, &session).await;
    result
}

// ---------------------------------------------------------------------------
// Roster header drift
// ---------------------------------------------------------------------------

/// The merged roster carries the first header seen. Flag devices whose
/// export declares a different schema.
fn warn_on_schema_drift(exports: &[RosterExport]) {
    let mut reference: Option<(DeviceId, RosterSchema)> = None;
    for e in exports {
        if e.header.trim().is_empty() {
            warn!(device_id = %e.device_id, "roster export has no header");
            continue;
        }
        let schema = match RosterSchema::from_header(&e.header) {
            Ok(s) => s,
            Err(err) => {
                warn!(device_id = %e.device_id, error = %err, "roster header unreadable");
                continue;
            }
        };
        if let Some((ref_id, ref_schema)) = &reference {
            if *ref_schema != schema {
                warn!(
                    device_id = %e.device_id,
                    reference_device = %ref_id,
                    header = %e.header,
                    "roster header differs from the header being pushed"
                );
            }
            continue;
        }
        reference = Some((e.device_id, schema));
    }
}
