// src/storage/local.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::RunMetadata;
use crate::errors::Result;
use crate::fs::atomic_write;
use crate::storage::MetadataStore;
use crate::types::StorageEngine;

/// Writes `<log_dir>/metadata/<job>/<timestamp>.json`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            root: log_dir.join("metadata"),
        }
    }

    pub fn manifest_path(&self, job_name: &str, timestamp: i64) -> PathBuf {
        self.root.join(job_name).join(format!("{timestamp}.json"))
    }
}

impl MetadataStore for LocalStore {
    fn engine(&self) -> StorageEngine {
        StorageEngine::Local
    }

    fn save(&self, timestamp: i64, metadata: &RunMetadata) -> Result<()> {
        let path = self.manifest_path(&metadata.job_name, timestamp);
        let bytes = serde_json::to_vec_pretty(metadata)?;
        atomic_write(&path, &bytes)?;
        debug!(path = ?path, "run metadata saved");
        Ok(())
    }

    fn load(&self, job_name: &str, timestamp: i64) -> Result<Option<RunMetadata>> {
        let path = self.manifest_path(job_name, timestamp);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
