// src/view/mod.rs

//! Parsed snapshot layout and read helpers.
//!
//! ```text
//! <view_dir>/<kind>/overview                      JSON array of OverviewEntry
//! <view_dir>/<kind>/<timestamp>/<parsed_filename> one snapshot per run
//! ```
//!
//! Exporters and UIs only ever read from here.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ProbeflowError, Result};
use crate::fs::atomic_write;
use crate::types::ParserKind;

pub const OVERVIEW_FILE: &str = "overview";

/// One point of a kind's overview time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewEntry {
    pub timestamp: i64,
    /// Headline number of the snapshot (average latency or total samples).
    pub value: u64,
    pub triggered: bool,
}

pub fn kind_dir(view_dir: &Path, kind: ParserKind) -> PathBuf {
    view_dir.join(kind.as_str())
}

pub fn snapshot_path(view_dir: &Path, kind: ParserKind, timestamp: i64) -> PathBuf {
    kind_dir(view_dir, kind)
        .join(timestamp.to_string())
        .join(kind.parsed_filename())
}

pub fn overview_path(view_dir: &Path, kind: ParserKind) -> PathBuf {
    kind_dir(view_dir, kind).join(OVERVIEW_FILE)
}

/// Write a snapshot, replacing any previous one for the same timestamp.
pub fn write_snapshot(
    view_dir: &Path,
    kind: ParserKind,
    timestamp: i64,
    contents: &[u8],
) -> Result<PathBuf> {
    let path = snapshot_path(view_dir, kind, timestamp);
    atomic_write(&path, contents)?;
    debug!(path = ?path, "snapshot written");
    Ok(path)
}

/// Add `entry` to the kind's overview.
pub fn append_overview(view_dir: &Path, kind: ParserKind, entry: OverviewEntry) -> Result<()> {
    let mut entries = read_overview(view_dir, kind)?;
    entries.push(entry);
    let bytes = serde_json::to_vec(&entries)?;
    atomic_write(&overview_path(view_dir, kind), &bytes)?;
    Ok(())
}

/// The kind's overview; empty if nothing was parsed yet.
pub fn read_overview(view_dir: &Path, kind: ParserKind) -> Result<Vec<OverviewEntry>> {
    let path = overview_path(view_dir, kind);
    match fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            ProbeflowError::ParseError(format!("{}: {e}", path.display()))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Most recent snapshot timestamp of a kind, if any.
pub fn latest_timestamp(view_dir: &Path, kind: ParserKind) -> Result<Option<i64>> {
    let dir = kind_dir(view_dir, kind);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(ts) = entry.file_name().to_str().and_then(|s| s.parse::<i64>().ok()) else {
            continue;
        };
        latest = latest.max(Some(ts));
    }
    Ok(latest)
}

/// A stored snapshot as generic JSON.
pub fn read_snapshot(view_dir: &Path, kind: ParserKind, timestamp: i64) -> Result<serde_json::Value> {
    let path = snapshot_path(view_dir, kind, timestamp);
    let bytes = fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
