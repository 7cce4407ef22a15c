// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::ParserKind;

/// Command-line arguments for `probeflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "probeflow",
    version,
    about = "Run conditional kernel-profiling jobs and parse their output into snapshots.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROBEFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the configured jobs, periodically or once.
    Run(RunArgs),
    /// Parse raw output files into a snapshot.
    Parse(ParseArgs),
    /// Print a stored snapshot or a kind's overview.
    Show(ShowArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Probeflow.toml")]
    pub config: PathBuf,

    /// Submit every job once and exit when all walks have ended.
    #[arg(long)]
    pub once: bool,

    /// Only run these jobs (repeatable). Default: all jobs.
    #[arg(long = "job", value_name = "NAME")]
    pub jobs: Vec<String>,

    /// Parse + validate, print jobs, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not parse completed runs into snapshots.
    #[arg(long)]
    pub no_parse: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ParseArgs {
    /// Parser to use (io-latency, cpu-profile).
    #[arg(long, value_parser = parse_kind)]
    pub kind: ParserKind,

    /// Raw input file or file-name glob (repeatable, read in order).
    #[arg(long = "input", value_name = "PATH", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Snapshot root.
    #[arg(long, value_name = "DIR", default_value = "probeflow/view")]
    pub view_dir: PathBuf,

    /// Snapshot timestamp (unix seconds). Default: now.
    #[arg(long)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ShowArgs {
    /// Snapshot root.
    #[arg(long, value_name = "DIR", default_value = "probeflow/view")]
    pub view_dir: PathBuf,

    #[arg(long, value_parser = parse_kind)]
    pub kind: ParserKind,

    /// Snapshot to print. Default: the latest one.
    #[arg(long)]
    pub timestamp: Option<i64>,

    /// Print the overview instead of a snapshot.
    #[arg(long)]
    pub overview: bool,
}

fn parse_kind(s: &str) -> Result<ParserKind, String> {
    s.parse()
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
