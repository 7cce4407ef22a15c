// src/engine/mod.rs

//! Job orchestration engine.
//!
//! This module ties together:
//! - the in-flight registry (one active walk per job name)
//! - the graph walk that drives a job's routines
//! - the broadcast-once shutdown signal
//! - the periodic scheduler used by `probeflow run`
//!
//! Walks report to the outside world only at their end, through a
//! [`MetadataStore`](crate::storage::MetadataStore) and a
//! [`Publisher`](crate::pubsub::Publisher).

pub mod metadata;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod walk;

pub use metadata::{JobCompleteEvent, RunMetadata, StepRecord};
pub use orchestrator::{JobHandle, JobOrchestrator, OrchestratorOptions};
pub use registry::{InFlightGuard, InFlightRegistry};
pub use scheduler::{run_schedule, submit_all};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use walk::{AbortReason, WalkOutcome};
