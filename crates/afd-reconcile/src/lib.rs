//! afd-reconcile
//!
//! Attendance-log reconciliation engine for a fleet of time-clock devices.
//!
//! Pipeline, leaf first:
//! - `parser`    fixed-width AFD line -> [`AttendanceRecord`] (or a [`MalformedLine`] reason)
//! - `csv`       roster export -> header + ordered lines, employee key extraction
//! - `engine`    many device batches -> one [`AuthoritativeMap`] (latest record per employee)
//! - `merge`     authoritative map + device rosters -> canonical roster, chunked for upload
//! - `watermark` authoritative map -> candidate per-device NSR watermarks
//!
//! Deterministic, pure logic. No IO, no clock, no logging. Device transport,
//! watermark persistence and orchestration live in the collaborator crates.

mod csv;
mod engine;
mod merge;
mod parser;
mod roster;
mod types;
mod watermark;

pub use csv::{extract_key, extract_key_with, split_csv, SplitCsv, DEFAULT_SEPARATOR};
pub use engine::{resolve, DeviceStats, FoldOutcome, ResolveStats, Resolver};
pub use merge::{
    chunk_lines, merge_rosters, merge_rosters_with_limit, select_lines, MergeOutcome,
    MergedRoster, SelectedLine, DEFAULT_MAX_CHUNK_LEN,
};
pub use parser::{is_punch_line, parse_record, prepare_log_lines, MalformedLine, RECORD_MIN_LEN};
pub use roster::{FieldKind, RosterField, RosterRow, RosterRowBuilder, RosterRowError, RosterSchema};
pub use types::*;
pub use watermark::{advance_watermark, compute_watermarks, WatermarkAdvance};
