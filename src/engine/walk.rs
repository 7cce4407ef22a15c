// src/engine/walk.rs

//! The routine-graph walk of a single job.
//!
//! Starting at `job.start`, each routine is turned into a condition/task
//! pair, the condition is checked, and the walk follows `on_failure` or runs
//! the task and follows `on_success`. An empty successor ends the walk
//! normally: the manifest is saved and a `job_complete` event published.
//! Every other ending (missing routine, task error or timeout, shutdown)
//! aborts and persists nothing.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::engine::metadata::{JobCompleteEvent, RunMetadata};
use crate::engine::registry::InFlightGuard;
use crate::engine::shutdown::{Shutdown, ShutdownSignal};
use crate::errors::ProbeflowError;
use crate::job::Job;
use crate::pubsub::{JOB_COMPLETE_TOPIC, Publisher};
use crate::storage::MetadataStore;
use crate::task::{ExecContext, RoutineTasks, TaskContract, TaskFactory};

/// How a walk ended.
#[derive(Debug)]
pub enum WalkOutcome {
    /// Reached an empty successor; the manifest was handed to storage and
    /// pub/sub.
    Completed {
        timestamp: i64,
        metadata: RunMetadata,
    },
    /// Stopped early; nothing was persisted.
    Aborted { job: String, reason: AbortReason },
}

impl WalkOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WalkOutcome::Completed { .. })
    }

    pub fn metadata(&self) -> Option<&RunMetadata> {
        match self {
            WalkOutcome::Completed { metadata, .. } => Some(metadata),
            WalkOutcome::Aborted { .. } => None,
        }
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            WalkOutcome::Completed { .. } => None,
            WalkOutcome::Aborted { reason, .. } => Some(reason),
        }
    }
}

#[derive(Debug)]
pub enum AbortReason {
    /// The job referenced a routine that does not exist, or a routine could
    /// not be built.
    Config(ProbeflowError),
    /// A task failed, timed out, or vanished without reporting.
    Task(ProbeflowError),
    Shutdown,
    /// The walk itself panicked.
    Panicked(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Config(err) => write!(f, "configuration: {err}"),
            AbortReason::Task(err) => write!(f, "task: {err}"),
            AbortReason::Shutdown => f.write_str("shutdown requested"),
            AbortReason::Panicked(msg) => write!(f, "walk panicked: {msg}"),
        }
    }
}

/// Collaborators shared by every walk of one orchestrator.
pub(crate) struct WalkContext {
    pub storage: Arc<dyn MetadataStore>,
    pub publisher: Arc<dyn Publisher>,
    pub factory: TaskFactory,
    pub shutdown: Shutdown,
    pub log_dir: PathBuf,
}

/// Walk `job` to its end. `guard` is released only after the manifest has
/// been persisted and published (or the walk aborted).
pub(crate) async fn run_walk(
    ctx: Arc<WalkContext>,
    job: Job,
    timestamp: i64,
    guard: InFlightGuard,
) -> WalkOutcome {
    let shutdown = ctx.shutdown.subscribe();
    let metadata = RunMetadata::new(job.name.clone());
    let mut walk = GraphWalk {
        ctx,
        job,
        timestamp,
        metadata,
        shutdown,
    };

    info!(job = %walk.job.name, data_label = %walk.metadata.data_label, "walk started");

    let outcome = match walk.walk().await {
        Ok(()) => walk.complete(),
        Err(reason) => {
            warn!(job = %walk.job.name, %reason, "walk aborted; nothing persisted");
            WalkOutcome::Aborted {
                job: walk.job.name,
                reason,
            }
        }
    };

    drop(guard);
    outcome
}

struct GraphWalk {
    ctx: Arc<WalkContext>,
    job: Job,
    timestamp: i64,
    metadata: RunMetadata,
    shutdown: ShutdownSignal,
}

impl GraphWalk {
    async fn walk(&mut self) -> Result<(), AbortReason> {
        let mut current = Some(self.job.start.clone()).filter(|name| !name.is_empty());

        while let Some(name) = current {
            let routine = self.job.routines.get(&name).ok_or_else(|| {
                let err = ProbeflowError::ConfigError(format!(
                    "job '{}' has no routine '{}'",
                    self.job.name, name
                ));
                error!(job = %self.job.name, routine = %name, "unknown routine");
                AbortReason::Config(err)
            })?;

            let on_success = routine.next(true);
            let on_failure = routine.next(false);
            let RoutineTasks { condition, task } =
                self.ctx.factory.build(routine).map_err(AbortReason::Config)?;

            let exec_ctx = ExecContext::new(&self.ctx.log_dir, &self.metadata.data_label);

            debug!(job = %self.job.name, routine = %name, condition = condition.kind(), "checking condition");
            let checked = condition.check(&exec_ctx).await;
            self.metadata.push(condition.step_record());

            match checked {
                Ok(()) => {
                    self.run_task(&name, task, exec_ctx).await?;
                    current = on_success;
                }
                Err(err) => {
                    if err.is_condition_unmet() {
                        info!(job = %self.job.name, routine = %name, reason = %err, "condition not met");
                    } else {
                        warn!(job = %self.job.name, routine = %name, error = %err, "condition check failed");
                    }
                    current = on_failure;
                }
            }
        }

        Ok(())
    }

    async fn run_task(
        &mut self,
        routine: &str,
        task: Box<dyn TaskContract>,
        exec_ctx: ExecContext,
    ) -> Result<(), AbortReason> {
        let step = task.step_record();
        let limit = task.deadline().saturating_add(self.ctx.factory.grace());

        if self.shutdown.is_requested() {
            info!(job = %self.job.name, routine, "shutdown requested; task not started");
            return Err(AbortReason::Shutdown);
        }

        info!(job = %self.job.name, routine, task = task.kind(), ?limit, "running task");

        let (tx, rx) = oneshot::channel();
        task.execute(exec_ctx, tx);

        let received = tokio::select! {
            biased;
            _ = self.shutdown.recv() => {
                info!(job = %self.job.name, routine, "shutdown while waiting for task");
                return Err(AbortReason::Shutdown);
            }
            res = tokio::time::timeout(limit, rx) => res,
        };

        match received {
            Err(_) => Err(AbortReason::Task(ProbeflowError::TaskTimeout(limit))),
            Ok(Err(_)) => Err(AbortReason::Task(ProbeflowError::TaskFailure(format!(
                "task of routine '{routine}' ended without reporting a result"
            )))),
            Ok(Ok(Err(err))) => Err(AbortReason::Task(err)),
            Ok(Ok(Ok(output))) => {
                debug!(job = %self.job.name, routine, files = ?output.output_files, "task succeeded");
                self.metadata.push(step);
                Ok(())
            }
        }
    }

    fn complete(self) -> WalkOutcome {
        let job = self.job.name;
        let event = JobCompleteEvent {
            timestamp: self.timestamp,
            metadata: self.metadata,
        };

        match self.ctx.storage.save(event.timestamp, &event.metadata) {
            Ok(()) => debug!(job = %job, engine = ?self.ctx.storage.engine(), "manifest saved"),
            Err(err) => error!(job = %job, error = %err, "saving run metadata failed"),
        }

        match event.to_bytes() {
            Ok(payload) => {
                if let Err(err) = self.ctx.publisher.publish(JOB_COMPLETE_TOPIC, payload) {
                    error!(job = %job, error = %err, "publishing job_complete failed");
                }
            }
            Err(err) => error!(job = %job, error = %err, "encoding job_complete failed"),
        }

        info!(job = %job, steps = event.metadata.steps().len(), "walk completed");

        WalkOutcome::Completed {
            timestamp: event.timestamp,
            metadata: event.metadata,
        }
    }
}
