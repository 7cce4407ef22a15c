// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kernel probe a `probe` task collects with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Block I/O completion latency per request.
    IoLatency,
    /// On-CPU stack sampling, emitted as collapsed stacks.
    CpuProfile,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::IoLatency => "io_latency",
            ProbeKind::CpuProfile => "cpu_profile",
        }
    }

    /// Parser that understands this probe's raw output.
    pub fn parser(&self) -> ParserKind {
        match self {
            ProbeKind::IoLatency => ParserKind::IoLatency,
            ProbeKind::CpuProfile => ParserKind::CpuProfile,
        }
    }

    /// File name a loader stores its raw data under.
    pub fn raw_filename(&self) -> &'static str {
        match self {
            ProbeKind::IoLatency => "io_latency.json",
            ProbeKind::CpuProfile => "cpu_profile.folded",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "io_latency" => Ok(ProbeKind::IoLatency),
            "cpu_profile" => Ok(ProbeKind::CpuProfile),
            other => Err(format!(
                "invalid probe kind: {other} (expected \"io_latency\" or \"cpu_profile\")"
            )),
        }
    }
}

/// Snapshot parser, which is also the job kind directory under the view dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    IoLatency,
    CpuProfile,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::IoLatency => "io_latency",
            ParserKind::CpuProfile => "cpu_profile",
        }
    }

    /// Name of the parsed snapshot inside `<view_dir>/<kind>/<timestamp>/`.
    pub fn parsed_filename(&self) -> &'static str {
        match self {
            ParserKind::IoLatency => "blk_ios.json",
            ParserKind::CpuProfile => "overall_cpu.stack.json",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "io_latency" => Ok(ParserKind::IoLatency),
            "cpu_profile" => Ok(ParserKind::CpuProfile),
            other => Err(format!(
                "invalid parser kind: {other} (expected \"io_latency\" or \"cpu_profile\")"
            )),
        }
    }
}

/// Engine used to persist run metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    /// One JSON manifest per run under `<log_dir>/metadata/`.
    Local,
    /// Kept in memory only (lost on restart).
    Memory,
}

impl Default for StorageEngine {
    fn default() -> Self {
        StorageEngine::Local
    }
}

impl FromStr for StorageEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageEngine::Local),
            "memory" => Ok(StorageEngine::Memory),
            other => Err(format!(
                "unknown storage engine: {other} (expected \"local\" or \"memory\")"
            )),
        }
    }
}
