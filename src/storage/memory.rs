// src/storage/memory.rs

use std::sync::Mutex;

use crate::engine::RunMetadata;
use crate::errors::Result;
use crate::storage::MetadataStore;
use crate::types::StorageEngine;

/// In-process store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<(i64, RunMetadata)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything saved so far, in save order.
    pub fn saved(&self) -> Vec<(i64, RunMetadata)> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl MetadataStore for MemoryStore {
    fn engine(&self) -> StorageEngine {
        StorageEngine::Memory
    }

    fn save(&self, timestamp: i64, metadata: &RunMetadata) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((timestamp, metadata.clone()));
        Ok(())
    }

    fn load(&self, job_name: &str, timestamp: i64) -> Result<Option<RunMetadata>> {
        let saved = self
            .saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(saved
            .iter()
            .rev()
            .find(|(ts, meta)| *ts == timestamp && meta.job_name == job_name)
            .map(|(_, meta)| meta.clone()))
    }
}
