// src/storage/mod.rs

//! Run-metadata persistence.
//!
//! The orchestrator hands every completed walk's [`RunMetadata`] to a
//! [`MetadataStore`]. Engines are selected by name from `[config]`:
//!
//! - `local`: one JSON manifest per run under `<log_dir>/metadata/`.
//! - `memory`: kept in process, mostly useful for tests and dry runs.

pub mod local;
pub mod memory;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::engine::RunMetadata;
use crate::errors::{ProbeflowError, Result};
use crate::types::StorageEngine;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Sink for run manifests.
pub trait MetadataStore: Send + Sync {
    fn engine(&self) -> StorageEngine;

    /// Persist the manifest of a walk that started at `timestamp`.
    fn save(&self, timestamp: i64, metadata: &RunMetadata) -> Result<()>;

    /// Manifest saved for `job_name` at `timestamp`, if any.
    fn load(&self, job_name: &str, timestamp: i64) -> Result<Option<RunMetadata>>;
}

/// Open the store for `engine`.
pub fn open_store(engine: StorageEngine, log_dir: &Path) -> Arc<dyn MetadataStore> {
    match engine {
        StorageEngine::Local => Arc::new(LocalStore::new(log_dir)),
        StorageEngine::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Open a store by engine name; unknown names are a config error.
pub fn open_store_by_name(name: &str, log_dir: &Path) -> Result<Arc<dyn MetadataStore>> {
    let engine = StorageEngine::from_str(name).map_err(ProbeflowError::ConfigError)?;
    Ok(open_store(engine, log_dir))
}
