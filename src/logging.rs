// src/logging.rs

//! Structured logging for `probeflow`.
//!
//! The filter comes from the `--log-level` flag when given. Otherwise
//! `PROBEFLOW_LOG` is read as a full `EnvFilter` directive, so
//! `PROBEFLOW_LOG=warn,probeflow::engine=debug` works as well as a bare
//! level. Without either, everything at `info` and above is shown.
//!
//! Output goes to stderr; `probeflow show` prints snapshots on stdout.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "PROBEFLOW_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_env_filter(build_filter(cli_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(directive(level));
    }
    match std::env::var(LOG_ENV) {
        Ok(raw) if !raw.trim().is_empty() => EnvFilter::try_new(raw.trim()).unwrap_or_else(|e| {
            eprintln!("ignoring invalid {LOG_ENV} value {raw:?}: {e}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        _ => EnvFilter::new(DEFAULT_DIRECTIVE),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
