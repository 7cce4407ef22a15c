// src/engine/orchestrator.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::engine::registry::InFlightRegistry;
use crate::engine::shutdown::Shutdown;
use crate::engine::walk::{AbortReason, WalkContext, WalkOutcome, run_walk};
use crate::errors::{ProbeflowError, Result};
use crate::job::Job;
use crate::pubsub::Publisher;
use crate::storage::MetadataStore;
use crate::task::TaskFactory;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Root of every walk's raw output directory.
    pub log_dir: PathBuf,
}

/// Accepts jobs and walks each on its own Tokio task.
///
/// At most one walk per job name is active at any time. Cloning shares the
/// registry and the shutdown flag.
#[derive(Clone)]
pub struct JobOrchestrator {
    registry: InFlightRegistry,
    ctx: Arc<WalkContext>,
}

impl fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("log_dir", &self.ctx.log_dir)
            .field("in_flight", &self.registry.names())
            .field("shutdown", &self.ctx.shutdown.is_requested())
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    /// Create an orchestrator; `options.log_dir` is created if missing.
    pub fn new(
        options: OrchestratorOptions,
        storage: Arc<dyn MetadataStore>,
        publisher: Arc<dyn Publisher>,
        factory: TaskFactory,
    ) -> Result<Self> {
        std::fs::create_dir_all(&options.log_dir)?;

        Ok(Self {
            registry: InFlightRegistry::new(),
            ctx: Arc::new(WalkContext {
                storage,
                publisher,
                factory,
                shutdown: Shutdown::new(),
                log_dir: options.log_dir,
            }),
        })
    }

    /// Start walking `job` in the background.
    ///
    /// Fails synchronously with `ShuttingDown` once shutdown was requested
    /// and with `AlreadyRunning` while another walk of the same name is
    /// active. The returned handle may be dropped; the walk keeps going.
    pub fn add(&self, job: Job) -> Result<JobHandle> {
        if self.ctx.shutdown.is_requested() {
            return Err(ProbeflowError::ShuttingDown(job.name));
        }

        let timestamp = Utc::now().timestamp();
        let guard = self.registry.try_insert(&job.name, timestamp)?;

        info!(job = %job.name, timestamp, "job accepted");

        let name = job.name.clone();
        let handle = tokio::spawn(run_walk(Arc::clone(&self.ctx), job, timestamp, guard));

        Ok(JobHandle { job: name, handle })
    }

    /// Request shutdown: walks waiting on a task abort and new jobs are
    /// rejected. Idempotent.
    pub fn shutdown(&self) {
        self.ctx.shutdown.request();
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.ctx.shutdown.clone()
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.registry.contains(job_name)
    }

    /// Number of walks currently active.
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }
}

/// Handle to a spawned walk.
#[derive(Debug)]
pub struct JobHandle {
    job: String,
    handle: JoinHandle<WalkOutcome>,
}

impl JobHandle {
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Wait for the walk to end.
    pub async fn wait(self) -> WalkOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => WalkOutcome::Aborted {
                job: self.job,
                reason: AbortReason::Panicked(err.to_string()),
            },
        }
    }
}
