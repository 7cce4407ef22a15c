// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod job;
pub mod logging;
pub mod parse;
pub mod pubsub;
pub mod storage;
pub mod task;
pub mod types;
pub mod view;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{CliArgs, Command, ParseArgs, RunArgs, ShowArgs};
use crate::config::{ConfigFile, load_and_validate};
use crate::engine::{JobOrchestrator, OrchestratorOptions, run_schedule, submit_all};
use crate::job::{Job, reachable_routines};
use crate::parse::{parse_into_view, spawn_parse_worker};
use crate::pubsub::BroadcastPublisher;
use crate::storage::open_store;
use crate::task::{ProbeRegistry, TaskFactory};

/// How long `run` waits for in-flight walks and the parse worker on exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run(run_args) => run_jobs(run_args).await,
        Command::Parse(parse_args) => parse_command(parse_args),
        Command::Show(show_args) => show_command(show_args),
    }
}

/// `probeflow run`.
///
/// This wires together:
/// - config loading
/// - metadata store, publisher and the parse worker
/// - the orchestrator and the scheduler
/// - Ctrl-C handling
async fn run_jobs(args: RunArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let jobs = select_jobs(&cfg, &args.jobs)?;

    if args.dry_run {
        print_dry_run(&cfg, &jobs);
        return Ok(());
    }

    let log_dir = cfg.config.log_dir.clone();
    let view_dir = cfg.config.view_dir.clone();

    let store = open_store(cfg.config.storage_engine, &log_dir);
    let publisher = Arc::new(BroadcastPublisher::default());

    let worker = if args.no_parse {
        None
    } else {
        Some(spawn_parse_worker(
            publisher.subscribe(),
            log_dir.clone(),
            view_dir,
        ))
    };

    let factory = TaskFactory::new(ProbeRegistry::from_config(&cfg.probe))
        .with_grace(Duration::from_secs(cfg.config.task_grace_secs));
    let orchestrator =
        JobOrchestrator::new(OrchestratorOptions { log_dir }, store, publisher, factory)?;

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = orchestrator.shutdown_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            shutdown.request();
        });
    }

    if args.once {
        for handle in submit_all(&orchestrator, &jobs) {
            let job = handle.job().to_string();
            let outcome = handle.wait().await;
            match outcome.abort_reason() {
                None => info!(job = %job, "job finished"),
                Some(reason) => warn!(job = %job, %reason, "job aborted"),
            }
        }
    } else {
        let interval = Duration::from_secs(cfg.config.interval_secs);
        run_schedule(orchestrator.clone(), jobs, interval).await;

        if tokio::time::timeout(DRAIN_TIMEOUT, wait_idle(&orchestrator))
            .await
            .is_err()
        {
            warn!(in_flight = orchestrator.in_flight(), "walks still active at exit");
        }
    }

    // Closing the publisher ends the parse worker once it has drained.
    drop(orchestrator);
    if let Some(worker) = worker {
        match tokio::time::timeout(DRAIN_TIMEOUT, worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "parse worker failed"),
            Err(_) => warn!("parse worker still busy at exit"),
        }
    }

    info!("probeflow exiting");
    Ok(())
}

async fn wait_idle(orchestrator: &JobOrchestrator) {
    while orchestrator.in_flight() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Jobs named on the command line, or all jobs.
fn select_jobs(cfg: &ConfigFile, names: &[String]) -> Result<Vec<Job>> {
    if names.is_empty() {
        return Ok(cfg.jobs().cloned().collect());
    }

    names
        .iter()
        .map(|name| {
            cfg.job
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown job '{name}'"))
        })
        .collect()
}

/// `probeflow parse`.
fn parse_command(args: ParseArgs) -> Result<()> {
    let mut inputs = Vec::new();
    for pattern in &args.inputs {
        inputs.extend(parse::inputs::expand(pattern)?);
    }
    if inputs.is_empty() {
        bail!("no input files match {:?}", args.inputs);
    }

    let timestamp = args.timestamp.unwrap_or_else(|| Utc::now().timestamp());
    let path = parse_into_view(args.kind, &inputs, &args.view_dir, timestamp)?;
    println!("{}", path.display());
    Ok(())
}

/// `probeflow show`.
fn show_command(args: ShowArgs) -> Result<()> {
    if args.overview {
        let entries = view::read_overview(&args.view_dir, args.kind)?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let timestamp = match args.timestamp {
        Some(ts) => ts,
        None => view::latest_timestamp(&args.view_dir, args.kind)?.ok_or_else(|| {
            anyhow!("no {} snapshots under {:?}", args.kind, args.view_dir)
        })?,
    };

    let snapshot = view::read_snapshot(&args.view_dir, args.kind, timestamp)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Simple dry-run output: print settings, probes and job graphs.
fn print_dry_run(cfg: &ConfigFile, jobs: &[Job]) {
    println!("probeflow dry-run");
    println!("  config.log_dir = {}", cfg.config.log_dir.display());
    println!("  config.view_dir = {}", cfg.config.view_dir.display());
    println!("  config.storage_engine = {:?}", cfg.config.storage_engine);
    println!("  config.interval_secs = {}", cfg.config.interval_secs);
    println!("  config.task_grace_secs = {}", cfg.config.task_grace_secs);
    println!();

    println!("probes ({}):", cfg.probe.len());
    for (kind, probe) in cfg.probe.iter() {
        println!("  - {kind}: {}", probe.cmd);
    }
    println!();

    println!("jobs ({}):", jobs.len());
    for job in jobs {
        println!("  - {} (start: {})", job.name, job.start);
        for name in reachable_routines(job) {
            let Some(routine) = job.routines.get(&name) else {
                continue;
            };
            println!(
                "      {name}: {} -> {}",
                routine.condition.kind_name(),
                routine.task.kind_name()
            );
            if let Some(next) = routine.next(true) {
                println!("        on_success: {next}");
            }
            if let Some(next) = routine.next(false) {
                println!("        on_failure: {next}");
            }
        }
    }
}
