// src/parse/mod.rs

//! Raw output → snapshot parsing.
//!
//! - [`io_latency`] aggregates block I/O latency records into rollups.
//! - [`flame`] builds a call tree from collapsed stack samples.
//! - [`inputs`] resolves a step's output postfix to raw files.
//! - [`worker`] parses completed runs as they are published.
//!
//! Every parse is independent: a failure only affects the snapshot being
//! produced and never touches snapshots already on disk.

pub mod flame;
pub mod inputs;
pub mod io_latency;
pub mod worker;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::engine::JobCompleteEvent;
use crate::errors::{ProbeflowError, Result};
use crate::types::ParserKind;
use crate::view::{OverviewEntry, append_overview, write_snapshot};

pub use flame::{FlameGraphBuilder, FlameNode};
pub use io_latency::{IoLatencySnapshot, LatencyRecord, Rollup, aggregate};
pub use worker::spawn_parse_worker;

/// Result of one parser run.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    IoLatency(IoLatencySnapshot),
    CpuProfile(FlameNode),
}

impl Snapshot {
    pub fn kind(&self) -> ParserKind {
        match self {
            Snapshot::IoLatency(_) => ParserKind::IoLatency,
            Snapshot::CpuProfile(_) => ParserKind::CpuProfile,
        }
    }

    /// Value recorded in the overview: average latency, or total samples.
    pub fn summary_value(&self) -> u64 {
        match self {
            Snapshot::IoLatency(snapshot) => snapshot.all.lat_avg_us,
            Snapshot::CpuProfile(root) => root.value,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Snapshot::IoLatency(snapshot) => serde_json::to_vec_pretty(snapshot)?,
            Snapshot::CpuProfile(root) => serde_json::to_vec_pretty(root)?,
        };
        Ok(bytes)
    }
}

/// Parse `inputs` (in order) with the `kind` parser.
pub fn parse_files(kind: ParserKind, inputs: &[PathBuf]) -> Result<Snapshot> {
    if inputs.is_empty() {
        return Err(ProbeflowError::EmptyInput(format!(
            "no raw input files for {kind}"
        )));
    }

    match kind {
        ParserKind::IoLatency => {
            let records = io_latency::read_window(inputs)?;
            Ok(Snapshot::IoLatency(aggregate(&records)?))
        }
        ParserKind::CpuProfile => {
            let mut builder = FlameGraphBuilder::new();
            for path in inputs {
                builder.add_file(path)?;
            }
            Ok(Snapshot::CpuProfile(builder.build()))
        }
    }
}

/// Parse `inputs`, write the snapshot for `timestamp` and extend the
/// overview. Nothing is written if parsing fails.
pub fn parse_into_view(
    kind: ParserKind,
    inputs: &[PathBuf],
    view_dir: &Path,
    timestamp: i64,
) -> Result<PathBuf> {
    let snapshot = parse_files(kind, inputs)?;
    let path = write_snapshot(view_dir, kind, timestamp, &snapshot.to_json()?)?;

    append_overview(
        view_dir,
        kind,
        OverviewEntry {
            timestamp,
            value: snapshot.summary_value(),
            triggered: true,
        },
    )?;

    info!(kind = %kind, timestamp, path = ?path, "snapshot parsed");
    Ok(path)
}

/// Outcome of parsing every step of a run.
#[derive(Debug, Default)]
pub struct ParseReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(ParserKind, ProbeflowError)>,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Parse every step of a completed run that names a parser.
pub fn parse_run(log_dir: &Path, view_dir: &Path, event: &JobCompleteEvent) -> ParseReport {
    let data_dir = log_dir.join(&event.metadata.data_label);
    let mut report = ParseReport::default();

    for step in event.metadata.steps() {
        let Some(kind) = step.parser else {
            continue;
        };

        let result = inputs::expand_under(&data_dir, &step.output_path_suffix)
            .map_err(ProbeflowError::from)
            .and_then(|inputs| parse_into_view(kind, &inputs, view_dir, event.timestamp));

        match result {
            Ok(path) => report.written.push(path),
            Err(err) => {
                warn!(
                    job = %event.metadata.job_name,
                    kind = %kind,
                    step = %step.task_kind,
                    error = %err,
                    "parsing step output failed"
                );
                report.failed.push((kind, err));
            }
        }
    }

    report
}
