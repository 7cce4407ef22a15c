// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::errors::{ProbeflowError, Result};

/// Job names with an active walk, mapped to the walk's start timestamp.
///
/// Entries are only created through [`InFlightRegistry::try_insert`] and only
/// removed when the returned [`InFlightGuard`] drops.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashMap<String, i64>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // The map stays consistent even if a holder panicked: every critical
        // section is a single insert or remove.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomically claim `name`, failing if a walk for it is already active.
    pub fn try_insert(&self, name: &str, started_at: i64) -> Result<InFlightGuard> {
        let mut map = self.lock();
        if map.contains_key(name) {
            return Err(ProbeflowError::AlreadyRunning(name.to_string()));
        }
        map.insert(name.to_string(), started_at);
        debug!(job = name, started_at, "job registered as in flight");

        Ok(InFlightGuard {
            registry: self.clone(),
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn started_at(&self, name: &str) -> Option<i64> {
        self.lock().get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names currently in flight, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Removes its job from the registry when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    name: String,
}

impl InFlightGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.name);
        debug!(job = %self.name, "job removed from in-flight registry");
    }
}
