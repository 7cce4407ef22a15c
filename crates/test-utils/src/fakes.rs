use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::Notify;

use probeflow::engine::{JobCompleteEvent, JobOrchestrator, OrchestratorOptions};
use probeflow::errors::{ProbeflowError, Result};
use probeflow::pubsub::Publisher;
use probeflow::storage::MemoryStore;
use probeflow::task::{BoxFuture, ProbeLoader, ProbeRegistry, TaskFactory};
use probeflow::types::ProbeKind;

/// What a [`FakeProbeLoader`] does.
#[derive(Clone)]
pub enum LoaderScript {
    /// Collect immediately and store these bytes.
    Succeed(Vec<u8>),
    /// Fail acquiring resources.
    FailPrepare,
    /// Fail while collecting.
    FailCollect,
    /// Collect until the notify fires (or forever).
    Block(Arc<Notify>),
}

/// Lifecycle counters shared by every loader a registry creates.
#[derive(Debug, Default)]
pub struct LoaderStats {
    pub prepared: AtomicUsize,
    pub collect_started: AtomicUsize,
    pub stored: AtomicUsize,
    pub closed: AtomicUsize,
}

impl LoaderStats {
    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn collect_started(&self) -> usize {
        self.collect_started.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A probe loader that follows a [`LoaderScript`] and counts lifecycle calls.
pub struct FakeProbeLoader {
    kind: ProbeKind,
    script: LoaderScript,
    stats: Arc<LoaderStats>,
    data: Vec<u8>,
}

impl FakeProbeLoader {
    pub fn new(kind: ProbeKind, script: LoaderScript, stats: Arc<LoaderStats>) -> Self {
        Self {
            kind,
            script,
            stats,
            data: Vec::new(),
        }
    }
}

impl ProbeLoader for FakeProbeLoader {
    fn prepare(&mut self) -> Result<()> {
        self.stats.prepared.fetch_add(1, Ordering::SeqCst);
        match self.script {
            LoaderScript::FailPrepare => Err(ProbeflowError::ResourceAcquisition(
                "fake: memlock denied".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn collect(&mut self, _phase: Duration) -> BoxFuture<'_, Result<()>> {
        self.stats.collect_started.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.script {
                LoaderScript::Succeed(bytes) => {
                    self.data = bytes.clone();
                    Ok(())
                }
                LoaderScript::FailCollect => Err(ProbeflowError::TaskFailure(
                    "fake: collection failed".to_string(),
                )),
                LoaderScript::Block(notify) => {
                    let notify = Arc::clone(notify);
                    notify.notified().await;
                    Ok(())
                }
                LoaderScript::FailPrepare => Ok(()),
            }
        })
    }

    fn store(&mut self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        self.stats.stored.fetch_add(1, Ordering::SeqCst);
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(self.kind.raw_filename());
        fs::write(&path, &self.data)?;
        Ok(vec![path])
    }

    fn close(&mut self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry whose `kind` loader follows `script`.
pub fn fake_registry(kind: ProbeKind, script: LoaderScript, stats: Arc<LoaderStats>) -> ProbeRegistry {
    ProbeRegistry::new().with(kind, move || {
        Box::new(FakeProbeLoader::new(kind, script.clone(), Arc::clone(&stats)))
            as Box<dyn ProbeLoader>
    })
}

/// Publisher that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().unwrap().clone()
    }

    /// Decoded `job_complete` payloads.
    pub fn events(&self) -> Vec<JobCompleteEvent> {
        self.messages()
            .iter()
            .map(|(_, payload)| JobCompleteEvent::from_bytes(payload).expect("valid payload"))
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

/// An orchestrator wired to in-memory collaborators and a temporary log dir.
pub struct Harness {
    pub orchestrator: JobOrchestrator,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub log_dir: TempDir,
}

impl Harness {
    pub fn new(registry: ProbeRegistry) -> Self {
        Self::with_grace(registry, Duration::from_secs(1))
    }

    pub fn with_grace(registry: ProbeRegistry, grace: Duration) -> Self {
        let log_dir = tempfile::tempdir().expect("create temp log dir");
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let factory = TaskFactory::new(registry).with_grace(grace);

        let orchestrator = JobOrchestrator::new(
            OrchestratorOptions {
                log_dir: log_dir.path().to_path_buf(),
            },
            store.clone(),
            publisher.clone(),
            factory,
        )
        .expect("create orchestrator");

        Self {
            orchestrator,
            store,
            publisher,
            log_dir,
        }
    }
}
