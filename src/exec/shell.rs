// src/exec/shell.rs

//! Shell command runner shared by command tasks, command conditions and the
//! external-command probe loader.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Environment variable pointing a command at its output directory.
pub const OUTPUT_DIR_ENV: &str = "PROBEFLOW_OUTPUT_DIR";

/// How a shell command ended.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    /// Exit code, `None` if the process was killed or died from a signal.
    pub code: Option<i32>,
    /// True when the process exited on its own with status 0.
    pub success: bool,
    /// True when the time limit elapsed and the process was killed.
    pub timed_out: bool,
    /// Everything the process wrote to stdout.
    pub stdout: Vec<u8>,
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str) -> Command {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    // Own process group, so a timeout also stops whatever the shell spawned.
    #[cfg(unix)]
    command.process_group(0);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Run `cmd` through the shell for at most `limit`, capturing stdout.
///
/// - If the process exits on its own, its status is reported.
/// - If `limit` elapses first, the process (group) is killed and
///   `timed_out` is set; the stdout gathered so far is still returned.
///
/// Stderr is always consumed and logged at debug level.
pub async fn run_captured(
    label: &str,
    cmd: &str,
    output_dir: Option<&Path>,
    limit: Duration,
) -> Result<ShellOutput> {
    info!(label, cmd, ?limit, "starting process");

    let mut command = shell_command(cmd);
    if let Some(dir) = output_dir {
        command.env(OUTPUT_DIR_ENV, dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for '{label}'"))?;

    let stdout = child.stdout.take();
    let stdout_reader = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stdout) = stdout {
            if let Err(e) = stdout.read_to_end(&mut buf).await {
                debug!(error = %e, "stdout read ended with error");
            }
        }
        buf
    });

    if let Some(stderr) = child.stderr.take() {
        let label = label.to_string();
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                debug!(label = %label, "stderr: {}", line);
            }
        });
    }

    let (code, success, timed_out) = tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for process of '{label}'"))?;
            (status.code(), status.success(), false)
        }
        _ = tokio::time::sleep(limit) => {
            info!(label, ?limit, "time limit reached; killing process");
            kill(&mut child).await;
            (None, false, true)
        }
    };

    let stdout = match tokio::time::timeout(Duration::from_secs(2), stdout_reader).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            warn!(label, error = %e, "stdout reader task failed");
            Vec::new()
        }
        Err(_) => {
            warn!(label, "stdout still open after process ended; output discarded");
            Vec::new()
        }
    };

    info!(label, exit_code = ?code, success, timed_out, bytes = stdout.len(), "process finished");

    Ok(ShellOutput {
        code,
        success,
        timed_out,
        stdout,
    })
}

async fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain syscall on the process group created in
            // `shell_command`; no memory is shared with the callee.
            let ret = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
            if ret != 0 {
                debug!(pid, error = %std::io::Error::last_os_error(), "killing process group failed");
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill child process (may have already exited)");
    }
}
