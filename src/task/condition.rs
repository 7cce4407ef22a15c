// src/task/condition.rs

//! Condition kinds.
//!
//! A condition returns `Ok(())` when its routine's task should run and
//! [`ProbeflowError::ConditionUnmet`] when the walk should take the failure
//! branch instead. Any other error also sends the walk down the failure
//! branch; it is only logged louder.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{ProbeflowError, Result};
use crate::exec::run_captured;
use crate::task::{BoxFuture, Condition, ExecContext};

/// Always satisfied.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysCondition;

impl Condition for AlwaysCondition {
    fn kind(&self) -> &'static str {
        "always"
    }

    fn check<'a>(&'a self, _ctx: &'a ExecContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Satisfied when a path exists.
#[derive(Debug, Clone)]
pub struct FileExistsCondition {
    path: PathBuf,
}

impl FileExistsCondition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Condition for FileExistsCondition {
    fn kind(&self) -> &'static str {
        "file_exists"
    }

    fn check<'a>(&'a self, _ctx: &'a ExecContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if tokio::fs::try_exists(&self.path).await? {
                Ok(())
            } else {
                Err(ProbeflowError::ConditionUnmet(format!(
                    "{} does not exist",
                    self.path.display()
                )))
            }
        })
    }
}

/// Artifact written by [`CpuUsageCondition`] into the data dir.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CpuUsageReport {
    percent: f64,
    threshold_percent: f64,
    triggered: bool,
}

/// Satisfied when system-wide CPU usage is at or above a threshold.
///
/// Usage is measured from two `/proc/stat` readings `sample` apart.
#[derive(Debug, Clone)]
pub struct CpuUsageCondition {
    threshold_percent: f64,
    sample: Duration,
}

impl CpuUsageCondition {
    pub const ARTIFACT: &'static str = "cpu_usage.json";

    pub fn new(threshold_percent: f64, sample: Duration) -> Self {
        Self {
            threshold_percent,
            sample,
        }
    }

    async fn measure(&self) -> Result<f64> {
        let before = read_cpu_times().await?;
        tokio::time::sleep(self.sample).await;
        let after = read_cpu_times().await?;
        Ok(busy_percent(before, after))
    }
}

impl Condition for CpuUsageCondition {
    fn kind(&self) -> &'static str {
        "cpu_usage"
    }

    fn log_postfix(&self) -> String {
        Self::ARTIFACT.to_string()
    }

    fn check<'a>(&'a self, ctx: &'a ExecContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let percent = self.measure().await?;
            let triggered = percent >= self.threshold_percent;

            let report = CpuUsageReport {
                percent,
                threshold_percent: self.threshold_percent,
                triggered,
            };
            let dir = ctx.data_dir();
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(dir.join(Self::ARTIFACT), serde_json::to_vec(&report)?).await?;

            info!(percent, threshold = self.threshold_percent, triggered, "cpu usage sampled");

            if triggered {
                Ok(())
            } else {
                Err(ProbeflowError::ConditionUnmet(format!(
                    "cpu usage {percent:.1}% below threshold {:.1}%",
                    self.threshold_percent
                )))
            }
        })
    }
}

/// Aggregate jiffies from the `cpu ` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

/// Parse the aggregate `cpu ` line of a `/proc/stat` dump.
///
/// Idle time is `idle + iowait`.
pub fn parse_proc_stat(contents: &str) -> Result<CpuTimes> {
    let line = contents
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ProbeflowError::ParseError("no aggregate cpu line in /proc/stat".into()))?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .map(|f| {
            f.parse::<u64>()
                .map_err(|e| ProbeflowError::ParseError(format!("/proc/stat field '{f}': {e}")))
        })
        .collect::<Result<Vec<u64>>>()?;

    if fields.len() < 4 {
        return Err(ProbeflowError::ParseError(format!(
            "/proc/stat cpu line has {} fields, expected at least 4",
            fields.len()
        )));
    }

    let overflow = || ProbeflowError::ParseError("/proc/stat cpu counters overflow u64".into());
    let idle = fields[3]
        .checked_add(fields.get(4).copied().unwrap_or(0))
        .ok_or_else(overflow)?;
    let total = fields
        .iter()
        .try_fold(0u64, |acc, f| acc.checked_add(*f))
        .ok_or_else(overflow)?;
    Ok(CpuTimes { total, idle })
}

/// Busy percentage between two readings; 0 when no time elapsed.
pub fn busy_percent(before: CpuTimes, after: CpuTimes) -> f64 {
    let total = after.total.saturating_sub(before.total);
    if total == 0 {
        return 0.0;
    }
    let idle = after.idle.saturating_sub(before.idle).min(total);
    100.0 * (total - idle) as f64 / total as f64
}

async fn read_cpu_times() -> Result<CpuTimes> {
    let contents = tokio::fs::read_to_string("/proc/stat").await.map_err(|e| {
        ProbeflowError::ResourceAcquisition(format!("reading /proc/stat: {e}"))
    })?;
    parse_proc_stat(&contents)
}

/// Satisfied when a shell command exits with status 0 within its timeout.
#[derive(Debug, Clone)]
pub struct CommandCondition {
    cmd: String,
    timeout: Duration,
}

impl CommandCondition {
    pub fn new(cmd: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cmd: cmd.into(),
            timeout,
        }
    }
}

impl Condition for CommandCondition {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn check<'a>(&'a self, _ctx: &'a ExecContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = run_captured("condition.command", &self.cmd, None, self.timeout).await?;

            if out.timed_out {
                return Err(ProbeflowError::ConditionUnmet(format!(
                    "'{}' did not finish within {:?}",
                    self.cmd, self.timeout
                )));
            }
            if !out.success {
                debug!(cmd = %self.cmd, code = ?out.code, "condition command failed");
                return Err(ProbeflowError::ConditionUnmet(format!(
                    "'{}' exited with {:?}",
                    self.cmd, out.code
                )));
            }
            Ok(())
        })
    }
}
