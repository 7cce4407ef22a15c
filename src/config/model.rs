// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::job::Job;
use crate::types::{ProbeKind, StorageEngine};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// log_dir = "/var/lib/probeflow/log"
/// view_dir = "/var/lib/probeflow/view"
/// storage_engine = "local"
/// interval_secs = 60
///
/// [probe.cpu_profile]
/// cmd = "profile-bpfcc -f -F 99 10"
///
/// [job.cpu]
/// start = "check"
///
/// [job.cpu.routine.check]
/// condition = { kind = "cpu_usage", threshold_percent = 80.0 }
/// task = { kind = "probe", probe = "cpu_profile", timeout_secs = 10 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Probe loaders from `[probe.<kind>]`, keyed by probe kind name.
    #[serde(default)]
    pub probe: BTreeMap<String, ProbeConfig>,

    /// Jobs from `[job.<name>]`.
    #[serde(default)]
    pub job: BTreeMap<String, Job>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root for raw task output: `<log_dir>/<data_label>/...`.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Root for parsed snapshots: `<view_dir>/<job_kind>/<timestamp>/...`.
    #[serde(default = "default_view_dir")]
    pub view_dir: PathBuf,

    /// `"local"` (default) or `"memory"`.
    #[serde(default)]
    pub storage_engine: StorageEngine,

    /// Seconds between scheduled submissions of every job.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Extra time a task may take beyond its own timeout before the
    /// orchestrator gives up on it.
    #[serde(default = "default_task_grace_secs")]
    pub task_grace_secs: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("probeflow/log")
}

fn default_view_dir() -> PathBuf {
    PathBuf::from("probeflow/view")
}

fn default_interval_secs() -> u64 {
    60
}

fn default_task_grace_secs() -> u64 {
    5
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            view_dir: default_view_dir(),
            storage_engine: StorageEngine::default(),
            interval_secs: default_interval_secs(),
            task_grace_secs: default_task_grace_secs(),
        }
    }
}

/// `[probe.<kind>]` section: an external collector command for a probe kind.
///
/// The command runs for the probe task's phase and its stdout becomes the raw
/// data (a JSON record array for `io_latency`, collapsed stacks for
/// `cpu_profile`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub cmd: String,
}

/// Validated configuration.
///
/// Only constructed through `ConfigFile::try_from(RawConfigFile)`, so every
/// job has its name filled in and a walkable routine graph.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub probe: BTreeMap<ProbeKind, ProbeConfig>,
    pub job: BTreeMap<String, Job>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        probe: BTreeMap<ProbeKind, ProbeConfig>,
        job: BTreeMap<String, Job>,
    ) -> Self {
        Self { config, probe, job }
    }

    /// Jobs in name order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.job.values()
    }
}
