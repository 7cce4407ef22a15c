// src/exec/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{ProbeflowError, Result};
use crate::exec::shell::run_captured;
use crate::task::{BoxFuture, ProbeLoader};
use crate::types::ProbeKind;

/// Probe loader backed by an external tracing command.
///
/// The command is expected to stream raw probe data on stdout until it is
/// stopped. Hitting the end of the phase is the normal way collection ends;
/// an early non-zero exit is a failure.
#[derive(Debug)]
pub struct ExternalCommandLoader {
    kind: ProbeKind,
    cmd: String,
    collected: Vec<u8>,
}

impl ExternalCommandLoader {
    pub fn new(kind: ProbeKind, cmd: impl Into<String>) -> Self {
        Self {
            kind,
            cmd: cmd.into(),
            collected: Vec::new(),
        }
    }
}

impl ProbeLoader for ExternalCommandLoader {
    fn prepare(&mut self) -> Result<()> {
        // The external tool acquires its own privileges.
        debug!(probe = %self.kind, "external loader: nothing to prepare");
        Ok(())
    }

    fn collect(&mut self, phase: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let label = format!("probe.{}", self.kind);
            let out = run_captured(&label, &self.cmd, None, phase).await?;

            if !out.timed_out && !out.success {
                return Err(ProbeflowError::TaskFailure(format!(
                    "probe command for '{}' exited with {:?}",
                    self.kind, out.code
                )));
            }

            self.collected = out.stdout;
            Ok(())
        })
    }

    fn store(&mut self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(self.kind.raw_filename());
        fs::write(&path, &self.collected)?;

        info!(probe = %self.kind, path = ?path, bytes = self.collected.len(), "raw probe data written");
        Ok(vec![path])
    }

    fn close(&mut self) {
        self.collected = Vec::new();
    }
}
