// src/engine/scheduler.rs

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::orchestrator::{JobHandle, JobOrchestrator};
use crate::errors::ProbeflowError;
use crate::job::Job;

/// Submit every job once. Jobs that are still running or rejected are
/// logged and skipped.
pub fn submit_all(orchestrator: &JobOrchestrator, jobs: &[Job]) -> Vec<JobHandle> {
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        match orchestrator.add(job.clone()) {
            Ok(handle) => handles.push(handle),
            Err(err @ ProbeflowError::AlreadyRunning(_)) => {
                warn!(job = %job.name, "{err}; skipping this round");
            }
            Err(ProbeflowError::ShuttingDown(_)) => {
                debug!(job = %job.name, "not submitted: shutting down");
                break;
            }
            Err(err) => warn!(job = %job.name, error = %err, "job rejected"),
        }
    }

    handles
}

/// Submit every job each `interval` until shutdown is requested.
///
/// The first round is submitted immediately. Walks still active when
/// shutdown arrives end on their own (aborting at their next task wait).
pub async fn run_schedule(orchestrator: JobOrchestrator, jobs: Vec<Job>, interval: Duration) {
    let mut shutdown = orchestrator.shutdown_handle().subscribe();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(jobs = jobs.len(), ?interval, "scheduler started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let handles = submit_all(&orchestrator, &jobs);
                debug!(submitted = handles.len(), "scheduler round submitted");
            }
        }
    }

    info!("scheduler stopped");
}
