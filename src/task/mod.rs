// src/task/mod.rs

//! Condition and task capabilities for routines.
//!
//! Every routine is turned into a pair of trait objects by the
//! [`TaskFactory`]: a [`Condition`] that is checked inline by the job walk,
//! and a [`TaskContract`] that runs as its own Tokio task and reports exactly
//! one [`TaskResult`] over a oneshot channel.
//!
//! - [`condition`] holds the condition kinds (`always`, `file_exists`,
//!   `cpu_usage`, `command`).
//! - [`probe`] holds the kernel-probe task and the [`ProbeLoader`] seam.
//! - [`command`] holds the shell command task.
//! - [`memlock`] lifts the locked-memory limit for kernel resources.
//! - [`factory`] maps routine specs onto the above.

pub mod command;
pub mod condition;
pub mod factory;
pub mod memlock;
pub mod probe;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::engine::StepRecord;
use crate::errors::Result;
use crate::types::ParserKind;

pub use factory::{RoutineTasks, TaskFactory};
pub use probe::{ProbeLoader, ProbeRegistry, ProbeTask};

/// Boxed future used by the object-safe traits in this module.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Files produced by a successful task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutput {
    pub output_files: Vec<PathBuf>,
}

/// What a task reports on its result channel, exactly once.
pub type TaskResult = Result<TaskOutput>;

/// Where a condition or task writes its artifacts.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub log_dir: PathBuf,
    pub data_label: String,
}

impl ExecContext {
    pub fn new(log_dir: impl Into<PathBuf>, data_label: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
            data_label: data_label.into(),
        }
    }

    /// `<log_dir>/<data_label>`: every raw artifact of one walk lives here.
    pub fn data_dir(&self) -> PathBuf {
        self.log_dir.join(&self.data_label)
    }

    /// Path of an artifact given its postfix relative to the data dir.
    pub fn output_path(&self, postfix: &str) -> PathBuf {
        self.data_dir().join(postfix)
    }
}

/// Cheap gating check evaluated before a routine's task.
pub trait Condition: Send + Sync {
    /// Kind identifier recorded in run metadata.
    fn kind(&self) -> &'static str;

    /// Postfix of the artifact this condition writes, if any.
    fn log_postfix(&self) -> String {
        String::new()
    }

    /// `Ok(())` when satisfied, `ConditionUnmet` otherwise.
    fn check<'a>(&'a self, ctx: &'a ExecContext) -> BoxFuture<'a, Result<()>>;

    fn step_record(&self) -> StepRecord {
        StepRecord::new(format!("condition.{}", self.kind()), self.log_postfix(), None)
    }
}

/// Data-collection step of a routine.
pub trait TaskContract: Send + Sync {
    /// Kind identifier recorded in run metadata.
    fn kind(&self) -> &'static str;

    /// Postfix (relative to the data dir, file-name globs allowed) of the raw
    /// output.
    fn log_postfix(&self) -> String;

    /// Parser that understands the raw output, if any.
    fn parser(&self) -> Option<ParserKind> {
        None
    }

    /// Longest time the task may run before it reports a timeout itself.
    fn deadline(&self) -> Duration;

    /// Start the task in the background.
    ///
    /// Implementations must send exactly one result on `result_tx`. The
    /// channel being dropped without a send is treated as a task failure.
    fn execute(self: Box<Self>, ctx: ExecContext, result_tx: oneshot::Sender<TaskResult>);

    fn step_record(&self) -> StepRecord {
        StepRecord::new(
            format!("task.{}", self.kind()),
            self.log_postfix(),
            self.parser(),
        )
    }
}

/// Run `fut` on its own Tokio task and deliver its result on `result_tx`.
pub(crate) fn spawn_reporting<F>(kind: &'static str, fut: F, result_tx: oneshot::Sender<TaskResult>)
where
    F: Future<Output = TaskResult> + Send + 'static,
{
    tokio::spawn(async move {
        let result = fut.await;
        if result_tx.send(result).is_err() {
            debug!(task = kind, "task result receiver dropped; result discarded");
        }
    });
}
