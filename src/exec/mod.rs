// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`shell`] runs a shell command under a time limit and captures stdout.
//! - [`loader`] provides [`ExternalCommandLoader`], the probe loader that
//!   delegates collection to an external tracing command.

pub mod loader;
pub mod shell;

pub use loader::ExternalCommandLoader;
pub use shell::{OUTPUT_DIR_ENV, ShellOutput, run_captured};
