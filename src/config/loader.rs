// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = ?path, bytes = contents.len(), "config file read");
    Ok(toml::from_str(&contents)?)
}

/// Read a config file and validate it.
///
/// Validation rejects unknown routine references, routine cycles, unknown
/// probe kinds, probe tasks whose loader is not configured and zero
/// intervals or timeouts. Unreachable routines only produce a warning.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// [`load_and_validate`] for TOML already in memory.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}
