// src/job/mod.rs

//! Job and routine data model.
//!
//! A [`Job`] is a named graph of [`Routine`]s plus a start node. Each routine
//! pairs a cheap condition with a heavier task and names the routine to walk
//! to next on success or failure. Jobs are plain data: they are deserialized
//! from the `[job.<name>]` tables of the config file or built in code, and are
//! never mutated once submitted to the orchestrator.
//!
//! ```toml
//! [job.cpu]
//! start = "check"
//!
//! [job.cpu.routine.check]
//! condition = { kind = "cpu_usage", threshold_percent = 80.0 }
//! task = { kind = "probe", probe = "cpu_profile", timeout_secs = 10 }
//! on_success = "io"
//!
//! [job.cpu.routine.io]
//! task = { kind = "probe", probe = "io_latency", timeout_secs = 5 }
//! ```

pub mod graph;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ParserKind, ProbeKind};

pub use graph::{reachable_routines, validate_job};

/// A named graph of routines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job name; filled in from the table key when loaded from config.
    #[serde(default)]
    pub name: String,

    /// Routine the walk starts at. Empty means the job has nothing to do.
    pub start: String,

    /// Routines keyed by name (`[job.<name>.routine.<routine>]`).
    #[serde(default, rename = "routine")]
    pub routines: BTreeMap<String, Routine>,
}

impl Job {
    pub fn new(name: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            routines: BTreeMap::new(),
        }
    }

    pub fn with_routine(mut self, name: impl Into<String>, routine: Routine) -> Self {
        self.routines.insert(name.into(), routine);
        self
    }
}

/// One node of a job's execution graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    #[serde(default)]
    pub condition: ConditionSpec,

    pub task: TaskSpec,

    /// Routine to continue with after the task succeeded.
    #[serde(default)]
    pub on_success: Option<String>,

    /// Routine to continue with when the condition is not met.
    #[serde(default)]
    pub on_failure: Option<String>,
}

impl Routine {
    pub fn new(task: TaskSpec) -> Self {
        Self {
            condition: ConditionSpec::Always,
            task,
            on_success: None,
            on_failure: None,
        }
    }

    /// Successor for the given branch; empty names count as terminal.
    pub fn next(&self, succeeded: bool) -> Option<String> {
        let next = if succeeded {
            &self.on_success
        } else {
            &self.on_failure
        };
        next.as_ref().filter(|name| !name.is_empty()).cloned()
    }
}

/// Condition kinds. Selected by the `kind` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSpec {
    /// Always satisfied.
    Always,

    /// Satisfied when `path` exists.
    FileExists { path: PathBuf },

    /// Satisfied when system-wide CPU usage over `sample_ms` is at least
    /// `threshold_percent`.
    CpuUsage {
        threshold_percent: f64,
        #[serde(default = "default_sample_ms")]
        sample_ms: u64,
    },

    /// Satisfied when the shell command exits with status 0.
    Command {
        cmd: String,
        #[serde(default = "default_condition_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for ConditionSpec {
    fn default() -> Self {
        ConditionSpec::Always
    }
}

impl ConditionSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConditionSpec::Always => "always",
            ConditionSpec::FileExists { .. } => "file_exists",
            ConditionSpec::CpuUsage { .. } => "cpu_usage",
            ConditionSpec::Command { .. } => "command",
        }
    }
}

fn default_sample_ms() -> u64 {
    500
}

fn default_condition_timeout_secs() -> u64 {
    10
}

/// Task kinds. Selected by the `kind` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    /// Kernel-probe collection for `timeout_secs`.
    Probe { probe: ProbeKind, timeout_secs: u64 },

    /// Shell command whose stdout is kept as the task's raw output.
    Command {
        cmd: String,
        timeout_secs: u64,
        #[serde(default = "default_command_output")]
        output: String,
        #[serde(default)]
        parser: Option<ParserKind>,
    },
}

impl TaskSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TaskSpec::Probe { .. } => "probe",
            TaskSpec::Command { .. } => "command",
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        match self {
            TaskSpec::Probe { timeout_secs, .. } | TaskSpec::Command { timeout_secs, .. } => {
                *timeout_secs
            }
        }
    }
}

fn default_command_output() -> String {
    "command.out".to_string()
}
