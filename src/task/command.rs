// src/task/command.rs

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::errors::{ProbeflowError, Result};
use crate::exec::run_captured;
use crate::task::{ExecContext, TaskContract, TaskOutput, TaskResult, spawn_reporting};
use crate::types::ParserKind;

/// Shell command whose stdout becomes the task's raw output.
///
/// The command sees `PROBEFLOW_OUTPUT_DIR` pointing at the run's data dir and
/// may drop extra files there. It is killed when `timeout` elapses, which
/// fails the task.
#[derive(Debug, Clone)]
pub struct CommandTask {
    cmd: String,
    timeout: Duration,
    output: String,
    parser: Option<ParserKind>,
}

impl CommandTask {
    pub fn new(
        cmd: impl Into<String>,
        timeout: Duration,
        output: impl Into<String>,
        parser: Option<ParserKind>,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            timeout,
            output: output.into(),
            parser,
        }
    }
}

impl TaskContract for CommandTask {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn log_postfix(&self) -> String {
        self.output.clone()
    }

    fn parser(&self) -> Option<ParserKind> {
        self.parser
    }

    fn deadline(&self) -> Duration {
        self.timeout
    }

    fn execute(self: Box<Self>, ctx: ExecContext, result_tx: oneshot::Sender<TaskResult>) {
        spawn_reporting("command", run_command(*self, ctx), result_tx);
    }
}

async fn run_command(task: CommandTask, ctx: ExecContext) -> TaskResult {
    let data_dir = ctx.data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;

    let out = run_captured("task.command", &task.cmd, Some(&data_dir), task.timeout).await?;

    if out.timed_out {
        warn!(cmd = %task.cmd, timeout = ?task.timeout, "command task timed out");
        return Err(ProbeflowError::TaskTimeout(task.timeout));
    }
    if !out.success {
        return Err(ProbeflowError::TaskFailure(format!(
            "'{}' exited with {:?}",
            task.cmd, out.code
        )));
    }

    let path = ctx.output_path(&task.output);
    write_output(&path, &out.stdout).await?;
    info!(path = ?path, bytes = out.stdout.len(), "command output written");

    Ok(TaskOutput {
        output_files: vec![path],
    })
}

async fn write_output(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
