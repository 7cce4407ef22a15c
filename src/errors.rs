// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in routine graph: {0}")]
    GraphCycle(String),

    #[error("Job [{0}] is still processing")]
    AlreadyRunning(String),

    #[error("Shutdown requested; job [{0}] rejected")]
    ShuttingDown(String),

    #[error("Condition unmet: {0}")]
    ConditionUnmet(String),

    #[error("Task failed: {0}")]
    TaskFailure(String),

    #[error("Task exceeded its deadline of {0:?}")]
    TaskTimeout(Duration),

    #[error("Resource acquisition failed: {0}")]
    ResourceAcquisition(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeflowError {
    /// Whether this is an ordinary unmet condition rather than a failure of
    /// the check itself.
    pub fn is_condition_unmet(&self) -> bool {
        matches!(self, ProbeflowError::ConditionUnmet(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProbeflowError>;
