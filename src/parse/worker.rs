// src/parse/worker.rs

use std::path::PathBuf;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::JobCompleteEvent;
use crate::parse::parse_run;
use crate::pubsub::{JOB_COMPLETE_TOPIC, Message};

/// Parse every run published on `job_complete` until the channel closes.
///
/// Parsing runs on the blocking pool, one run at a time.
pub fn spawn_parse_worker(
    mut rx: broadcast::Receiver<Message>,
    log_dir: PathBuf,
    view_dir: PathBuf,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(view_dir = ?view_dir, "parse worker started");

        loop {
            let message = match rx.recv().await {
                Ok(message) => message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "parse worker fell behind; runs skipped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if message.topic != JOB_COMPLETE_TOPIC {
                debug!(topic = %message.topic, "ignoring message");
                continue;
            }

            let event = match JobCompleteEvent::from_bytes(&message.payload) {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "undecodable job_complete payload");
                    continue;
                }
            };

            let log_dir = log_dir.clone();
            let view_dir = view_dir.clone();
            let job = event.metadata.job_name.clone();
            match tokio::task::spawn_blocking(move || parse_run(&log_dir, &view_dir, &event)).await {
                Ok(report) => info!(
                    job = %job,
                    written = report.written.len(),
                    failed = report.failed.len(),
                    "run parsed"
                ),
                Err(err) => warn!(job = %job, error = %err, "parse task panicked"),
            }
        }

        info!("parse worker stopped");
    })
}
