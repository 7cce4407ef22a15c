// src/engine/metadata.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Result;
use crate::types::ParserKind;

/// One executed step of a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// `condition.<kind>` or `task.<kind>`.
    pub task_kind: String,

    /// Where the step's output lives, relative to `<log_dir>/<data_label>`.
    /// Empty when the step wrote nothing.
    pub output_path_suffix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserKind>,
}

impl StepRecord {
    pub fn new(
        task_kind: impl Into<String>,
        output_path_suffix: impl Into<String>,
        parser: Option<ParserKind>,
    ) -> Self {
        Self {
            task_kind: task_kind.into(),
            output_path_suffix: output_path_suffix.into(),
            parser,
        }
    }
}

/// Manifest of one graph walk.
///
/// Steps are append-only; the manifest is persisted once when the walk ends
/// normally and dropped otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub job_name: String,

    /// Unique per walk; names the walk's raw output directory.
    pub data_label: String,

    steps: Vec<StepRecord>,
}

impl RunMetadata {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            data_label: Uuid::new_v4().to_string(),
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }
}

/// Payload published on the `job_complete` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompleteEvent {
    /// Walk start time, unix seconds.
    pub timestamp: i64,
    pub metadata: RunMetadata,
}

impl JobCompleteEvent {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
