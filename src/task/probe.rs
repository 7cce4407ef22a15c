// src/task/probe.rs

//! Kernel-probe task.
//!
//! The probe mechanics themselves live behind [`ProbeLoader`]; this module
//! only drives a loader through its lifecycle:
//!
//! acquire privileges -> collect for the phase -> store to disk -> close
//!
//! `close` runs on every path once a loader exists, including failures in
//! any earlier step.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::errors::{ProbeflowError, Result};
use crate::exec::ExternalCommandLoader;
use crate::task::memlock;
use crate::task::{BoxFuture, ExecContext, TaskContract, TaskOutput, TaskResult, spawn_reporting};
use crate::types::{ParserKind, ProbeKind};

/// One instance of a kernel probe.
///
/// Loaders are created fresh for every task execution and are not shared.
pub trait ProbeLoader: Send {
    /// Acquire what the probe needs before loading (by default: lift the
    /// locked-memory limit so kernel maps can be pinned).
    fn prepare(&mut self) -> Result<()> {
        memlock::remove_memlock_limit()
    }

    /// Load the probe and collect until `phase` has elapsed or collection
    /// completes on its own.
    fn collect(&mut self, phase: Duration) -> BoxFuture<'_, Result<()>>;

    /// Flush collected data under `output_dir`, returning the files written.
    fn store(&mut self, output_dir: &Path) -> Result<Vec<PathBuf>>;

    /// Release all kernel-held resources. Must be safe to call more than once.
    fn close(&mut self);
}

type LoaderFactory = Arc<dyn Fn() -> Box<dyn ProbeLoader> + Send + Sync>;

/// Loader constructors keyed by probe kind.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    loaders: HashMap<ProbeKind, LoaderFactory>,
}

impl fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of external-command loaders from `[probe.<kind>]` sections.
    pub fn from_config(probes: &BTreeMap<ProbeKind, ProbeConfig>) -> Self {
        let mut registry = Self::new();
        for (kind, probe) in probes.iter() {
            let kind = *kind;
            let cmd = probe.cmd.clone();
            registry.register(kind, move || {
                Box::new(ExternalCommandLoader::new(kind, cmd.clone())) as Box<dyn ProbeLoader>
            });
        }
        registry
    }

    /// Register (or replace) the loader constructor for `kind`.
    pub fn register<F>(&mut self, kind: ProbeKind, factory: F)
    where
        F: Fn() -> Box<dyn ProbeLoader> + Send + Sync + 'static,
    {
        self.loaders.insert(kind, Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, kind: ProbeKind, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ProbeLoader> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn contains(&self, kind: ProbeKind) -> bool {
        self.loaders.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ProbeKind> {
        let mut kinds: Vec<ProbeKind> = self.loaders.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Create a fresh loader for `kind`.
    pub fn create(&self, kind: ProbeKind) -> Result<Box<dyn ProbeLoader>> {
        let factory = self.loaders.get(&kind).ok_or_else(|| {
            ProbeflowError::ResourceAcquisition(format!(
                "no probe loader registered for '{kind}'"
            ))
        })?;
        Ok(factory())
    }
}

/// Task that runs one kernel probe for a fixed phase.
pub struct ProbeTask {
    probe: ProbeKind,
    phase: Duration,
    grace: Duration,
    registry: Arc<ProbeRegistry>,
}

impl ProbeTask {
    pub fn new(
        probe: ProbeKind,
        phase: Duration,
        grace: Duration,
        registry: Arc<ProbeRegistry>,
    ) -> Self {
        Self {
            probe,
            phase,
            grace,
            registry,
        }
    }
}

impl TaskContract for ProbeTask {
    fn kind(&self) -> &'static str {
        "probe"
    }

    fn log_postfix(&self) -> String {
        format!("{}/*", self.probe)
    }

    fn parser(&self) -> Option<ParserKind> {
        Some(self.probe.parser())
    }

    fn deadline(&self) -> Duration {
        self.phase.saturating_add(self.grace)
    }

    fn execute(self: Box<Self>, ctx: ExecContext, result_tx: oneshot::Sender<TaskResult>) {
        let output_dir = ctx.data_dir().join(self.probe.as_str());
        let fut = run_probe(self.probe, self.phase, self.deadline(), self.registry, output_dir);
        spawn_reporting("probe", fut, result_tx);
    }
}

async fn run_probe(
    probe: ProbeKind,
    phase: Duration,
    deadline: Duration,
    registry: Arc<ProbeRegistry>,
    output_dir: PathBuf,
) -> TaskResult {
    let mut loader = registry.create(probe)?;

    info!(probe = %probe, ?phase, output_dir = ?output_dir, "starting probe");
    let result = drive_loader(loader.as_mut(), probe, phase, deadline, &output_dir).await;

    loader.close();
    debug!(probe = %probe, "probe resources released");

    if let Err(ref err) = result {
        warn!(probe = %probe, error = %err, "probe task failed");
    }
    result
}

async fn drive_loader(
    loader: &mut dyn ProbeLoader,
    probe: ProbeKind,
    phase: Duration,
    deadline: Duration,
    output_dir: &Path,
) -> TaskResult {
    loader.prepare().map_err(|err| match err {
        err @ ProbeflowError::ResourceAcquisition(_) => err,
        other => ProbeflowError::ResourceAcquisition(format!("preparing '{probe}': {other}")),
    })?;

    match tokio::time::timeout(deadline, loader.collect(phase)).await {
        Ok(collected) => collected?,
        Err(_) => return Err(ProbeflowError::TaskTimeout(deadline)),
    }

    let output_files = loader.store(output_dir)?;
    info!(probe = %probe, files = output_files.len(), "probe data stored");

    Ok(TaskOutput { output_files })
}
