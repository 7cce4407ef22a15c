// tests/config_loading.rs

use std::path::PathBuf;

use probeflow::config::{load_and_validate, load_from_str};
use probeflow::errors::ProbeflowError;
use probeflow::job::{ConditionSpec, TaskSpec, reachable_routines};
use probeflow::types::{ParserKind, ProbeKind, StorageEngine};
use probeflow_test_utils::init_tracing;

const VALID: &str = r#"
[config]
log_dir = "/tmp/pf/log"
storage_engine = "memory"
interval_secs = 30

[probe.cpu_profile]
cmd = "profile-bpfcc -f 99"

[probe.io_latency]
cmd = "biolatency-json"

[job.cpu]
start = "check"

[job.cpu.routine.check]
condition = { kind = "cpu_usage", threshold_percent = 80.0 }
task = { kind = "probe", probe = "cpu_profile", timeout_secs = 10 }
on_success = "io"
on_failure = "log"

[job.cpu.routine.io]
condition = { kind = "file_exists", path = "/sys/block/sda" }
task = { kind = "probe", probe = "io_latency", timeout_secs = 5 }

[job.cpu.routine.log]
task = { kind = "command", cmd = "uptime", timeout_secs = 2, parser = "cpu_profile" }
"#;

#[test]
fn loads_valid_config_with_defaults() {
    init_tracing();
    let cfg = load_from_str(VALID).unwrap();

    assert_eq!(cfg.config.log_dir, PathBuf::from("/tmp/pf/log"));
    assert_eq!(cfg.config.view_dir, PathBuf::from("probeflow/view"));
    assert_eq!(cfg.config.storage_engine, StorageEngine::Memory);
    assert_eq!(cfg.config.interval_secs, 30);
    assert_eq!(cfg.config.task_grace_secs, 5);
    assert_eq!(
        cfg.probe.keys().copied().collect::<Vec<_>>(),
        vec![ProbeKind::IoLatency, ProbeKind::CpuProfile]
    );

    let job = &cfg.job["cpu"];
    assert_eq!(job.name, "cpu");
    assert_eq!(job.routines.len(), 3);

    let check = &job.routines["check"];
    assert!(matches!(
        check.condition,
        ConditionSpec::CpuUsage {
            sample_ms: 500,
            ..
        }
    ));
    assert_eq!(check.next(true).as_deref(), Some("io"));
    assert_eq!(check.next(false).as_deref(), Some("log"));

    match &job.routines["log"].task {
        TaskSpec::Command {
            output, parser, ..
        } => {
            assert_eq!(output, "command.out");
            assert_eq!(*parser, Some(ParserKind::CpuProfile));
        }
        other => panic!("expected command task, got {other:?}"),
    }
    assert_eq!(job.routines["log"].condition, ConditionSpec::Always);

    let mut reachable = reachable_routines(job);
    assert_eq!(reachable[0], "check");
    reachable.sort();
    assert_eq!(reachable, vec!["check", "io", "log"]);
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Probeflow.toml");
    std::fs::write(&path, VALID).unwrap();
    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.jobs().count(), 1);
}

#[test]
fn missing_file_is_io_error() {
    let err = load_and_validate("/definitely/not/Probeflow.toml").unwrap_err();
    assert!(matches!(err, ProbeflowError::IoError(_)));
}

fn expect_config_error(toml: &str, needle: &str) {
    match load_from_str(toml) {
        Err(ProbeflowError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}")
        }
        other => panic!("expected ConfigError, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn rejects_config_without_jobs() {
    expect_config_error("[config]\ninterval_secs = 5\n", "at least one");
}

#[test]
fn rejects_zero_interval() {
    expect_config_error(
        r#"
[config]
interval_secs = 0

[job.a]
start = ""
"#,
        "interval_secs",
    );
}

#[test]
fn rejects_unknown_probe_kind() {
    expect_config_error(
        r#"
[probe.gpu]
cmd = "x"

[job.a]
start = ""
"#,
        "gpu",
    );
}

#[test]
fn rejects_probe_task_without_loader() {
    expect_config_error(
        r#"
[job.a]
start = "p"

[job.a.routine.p]
task = { kind = "probe", probe = "io_latency", timeout_secs = 1 }
"#,
        "[probe.io_latency]",
    );
}

#[test]
fn rejects_unknown_start_and_successors() {
    expect_config_error(
        r#"
[job.a]
start = "nope"

[job.a.routine.p]
task = { kind = "command", cmd = "true", timeout_secs = 1 }
"#,
        "nope",
    );

    expect_config_error(
        r#"
[job.a]
start = "p"

[job.a.routine.p]
task = { kind = "command", cmd = "true", timeout_secs = 1 }
on_failure = "ghost"
"#,
        "ghost",
    );
}

#[test]
fn rejects_zero_task_timeout() {
    expect_config_error(
        r#"
[job.a]
start = "p"

[job.a.routine.p]
task = { kind = "command", cmd = "true", timeout_secs = 0 }
"#,
        "timeout_secs",
    );
}

#[test]
fn rejects_routine_cycles() {
    let err = load_from_str(
        r#"
[job.loop]
start = "a"

[job.loop.routine.a]
task = { kind = "command", cmd = "true", timeout_secs = 1 }
on_success = "b"

[job.loop.routine.b]
task = { kind = "command", cmd = "true", timeout_secs = 1 }
on_failure = "a"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ProbeflowError::GraphCycle(_)));
}

#[test]
fn unknown_condition_kind_is_toml_error() {
    let err = load_from_str(
        r#"
[job.a]
start = "p"

[job.a.routine.p]
condition = { kind = "moon_phase" }
task = { kind = "command", cmd = "true", timeout_secs = 1 }
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ProbeflowError::TomlError(_)));
}

#[test]
fn rejects_job_names_that_escape_the_metadata_dir() {
    for name in ["../x", "a/b", "a\\\\b", "..", ""] {
        let toml = format!(
            r#"
[job."{name}"]
start = ""
"#
        );
        expect_config_error(&toml, "invalid job name");
    }
}
