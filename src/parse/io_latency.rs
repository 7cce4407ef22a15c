// src/parse/io_latency.rs

//! Block I/O latency aggregation.
//!
//! One collection window of [`LatencyRecord`]s is folded, in a single pass,
//! into three tiers of [`Rollup`]: everything, per pid, per device.
//!
//! Raw input is a JSON array:
//!
//! ```json
//! [{"pid": 42, "comm": "postgres", "device": "sda", "op": "write", "sync": true, "latUs": 310}]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ProbeflowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
    Other,
}

/// One completed block request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRecord {
    pub pid: u32,
    pub comm: String,
    pub device: String,
    pub op: Operation,
    #[serde(default)]
    pub sync: bool,
    pub lat_us: u64,
}

/// Counts and latency bounds for one entity.
///
/// `reads + sync_reads + writes + sync_writes + other + sync_other ==
/// total_ios`, and every contributing latency lies in
/// `lat_low_us..=lat_high_us`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub total_ios: u64,
    pub reads: u64,
    pub sync_reads: u64,
    pub writes: u64,
    pub sync_writes: u64,
    pub other: u64,
    pub sync_other: u64,
    pub lat_avg_us: u64,
    pub lat_high_us: u64,
    pub lat_low_us: u64,
}

impl Rollup {
    fn add(&mut self, rec: &LatencyRecord) {
        if self.total_ios == 0 {
            self.lat_high_us = rec.lat_us;
            self.lat_low_us = rec.lat_us;
        } else {
            if rec.lat_us > self.lat_high_us {
                self.lat_high_us = rec.lat_us;
            }
            if rec.lat_us < self.lat_low_us {
                self.lat_low_us = rec.lat_us;
            }
        }

        let bucket = match (rec.op, rec.sync) {
            (Operation::Read, false) => &mut self.reads,
            (Operation::Read, true) => &mut self.sync_reads,
            (Operation::Write, false) => &mut self.writes,
            (Operation::Write, true) => &mut self.sync_writes,
            (Operation::Other, false) => &mut self.other,
            (Operation::Other, true) => &mut self.sync_other,
        };
        *bucket += 1;
        self.total_ios += 1;
    }

    fn finalize(&mut self, sum: u128) {
        if self.total_ios > 0 {
            self.lat_avg_us = (sum / u128::from(self.total_ios)) as u64;
        }
    }

    /// Sum of the six operation/sync buckets.
    pub fn bucket_total(&self) -> u64 {
        self.reads + self.sync_reads + self.writes + self.sync_writes + self.other + self.sync_other
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PidRollup {
    /// Process name of the first record seen for this pid.
    pub comm: String,
    pub blk_lat: Rollup,
}

/// Parsed `blk_ios.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoLatencySnapshot {
    pub all: Rollup,
    pub per_pid: BTreeMap<u32, PidRollup>,
    pub per_dev: BTreeMap<String, Rollup>,
}

/// Fold one window of records into rollups.
///
/// An empty window has no meaningful average and is rejected with
/// `EmptyInput`.
pub fn aggregate(records: &[LatencyRecord]) -> Result<IoLatencySnapshot> {
    if records.is_empty() {
        return Err(ProbeflowError::EmptyInput(
            "no latency records in window".to_string(),
        ));
    }

    let mut snapshot = IoLatencySnapshot::default();
    let mut all_sum: u128 = 0;
    let mut pid_sum: HashMap<u32, u128> = HashMap::new();
    let mut dev_sum: HashMap<String, u128> = HashMap::new();

    for rec in records {
        let lat = u128::from(rec.lat_us);

        snapshot.all.add(rec);
        all_sum += lat;

        let pid = snapshot.per_pid.entry(rec.pid).or_default();
        if pid.blk_lat.total_ios == 0 {
            pid.comm = rec.comm.clone();
        }
        pid.blk_lat.add(rec);
        *pid_sum.entry(rec.pid).or_default() += lat;

        snapshot.per_dev.entry(rec.device.clone()).or_default().add(rec);
        *dev_sum.entry(rec.device.clone()).or_default() += lat;
    }

    snapshot.all.finalize(all_sum);
    for (pid, sum) in pid_sum {
        if let Some(entry) = snapshot.per_pid.get_mut(&pid) {
            entry.blk_lat.finalize(sum);
        }
    }
    for (dev, sum) in dev_sum {
        if let Some(rollup) = snapshot.per_dev.get_mut(&dev) {
            rollup.finalize(sum);
        }
    }

    debug!(
        records = records.len(),
        pids = snapshot.per_pid.len(),
        devices = snapshot.per_dev.len(),
        "latency window aggregated"
    );
    Ok(snapshot)
}

/// Decode one raw JSON array of records.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<LatencyRecord>> {
    serde_json::from_slice(bytes).map_err(|e| ProbeflowError::ParseError(e.to_string()))
}

/// Read a window spread over several files, concatenated in order.
pub fn read_window<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<LatencyRecord>> {
    let mut records = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut batch: Vec<LatencyRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| ProbeflowError::ParseError(format!("{}: {e}", path.display())))?;
        records.append(&mut batch);
    }
    Ok(records)
}
