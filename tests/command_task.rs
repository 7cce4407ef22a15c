// tests/command_task.rs

#![cfg(unix)]

use std::time::Duration;

use tokio::sync::oneshot;

use probeflow::errors::ProbeflowError;
use probeflow::exec::ExternalCommandLoader;
use probeflow::task::command::CommandTask;
use probeflow::task::condition::CommandCondition;
use probeflow::task::{Condition, ExecContext, ProbeLoader, ProbeRegistry, TaskContract, TaskResult};
use probeflow::types::{ParserKind, ProbeKind};
use probeflow_test_utils::builders::{JobBuilder, RoutineBuilder};
use probeflow_test_utils::fakes::Harness;
use probeflow_test_utils::{init_tracing, with_timeout};

async fn run(task: CommandTask, ctx: ExecContext) -> TaskResult {
    let (tx, rx) = oneshot::channel();
    Box::new(task).execute(ctx, tx);
    with_timeout(rx).await.expect("task reports a result")
}

#[tokio::test]
async fn stdout_is_written_to_output_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let task = CommandTask::new("echo hello", Duration::from_secs(5), "out/hello.txt", None);

    let output = run(task, ExecContext::new(dir.path(), "run")).await.unwrap();

    let path = dir.path().join("run").join("out").join("hello.txt");
    assert_eq!(output.output_files, vec![path.clone()]);
    assert_eq!(std::fs::read_to_string(path).unwrap(), "hello\n");
}

#[tokio::test]
async fn command_sees_its_output_dir() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let task = CommandTask::new(
        r#"echo extra > "$PROBEFLOW_OUTPUT_DIR/extra.txt"; echo done"#,
        Duration::from_secs(5),
        "command.out",
        None,
    );

    run(task, ExecContext::new(dir.path(), "run")).await.unwrap();

    let extra = dir.path().join("run").join("extra.txt");
    assert_eq!(std::fs::read_to_string(extra).unwrap(), "extra\n");
}

#[tokio::test]
async fn non_zero_exit_fails_task() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let task = CommandTask::new("exit 3", Duration::from_secs(5), "command.out", None);

    let err = run(task, ExecContext::new(dir.path(), "run")).await.unwrap_err();
    assert!(matches!(err, ProbeflowError::TaskFailure(_)));
}

#[tokio::test]
async fn slow_command_is_killed_and_times_out() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let task = CommandTask::new("sleep 10", Duration::from_secs(1), "command.out", None);

    let started = std::time::Instant::now();
    let err = run(task, ExecContext::new(dir.path(), "run")).await.unwrap_err();

    assert!(matches!(err, ProbeflowError::TaskTimeout(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn command_condition_follows_exit_status() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let ctx = ExecContext::new(dir.path(), "run");

    let ok = CommandCondition::new("true", Duration::from_secs(5));
    assert!(ok.check(&ctx).await.is_ok());

    let unmet = CommandCondition::new("false", Duration::from_secs(5));
    let err = unmet.check(&ctx).await.unwrap_err();
    assert!(err.is_condition_unmet());
}

#[tokio::test]
async fn external_loader_treats_phase_end_as_normal_stop() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut loader = ExternalCommandLoader::new(ProbeKind::CpuProfile, "echo 'main;run 7'; sleep 10");

    loader.prepare().unwrap();
    loader.collect(Duration::from_millis(500)).await.unwrap();
    let files = loader.store(dir.path()).unwrap();
    loader.close();
    loader.close();

    assert_eq!(files, vec![dir.path().join("cpu_profile.folded")]);
    assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "main;run 7\n");
}

#[tokio::test]
async fn external_loader_early_failure_is_task_failure() {
    init_tracing();
    let mut loader = ExternalCommandLoader::new(ProbeKind::IoLatency, "exit 2");
    let err = loader.collect(Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, ProbeflowError::TaskFailure(_)));
}

#[tokio::test]
async fn command_routine_runs_end_to_end() {
    init_tracing();
    let h = Harness::new(ProbeRegistry::new());

    let job = JobBuilder::new("stacks")
        .start("gate")
        .routine(
            "gate",
            RoutineBuilder::command("echo 'main;loop 4'", 5)
                .when_command("true")
                .output("stacks.folded", Some(ParserKind::CpuProfile))
                .build(),
        )
        .build();

    let outcome = with_timeout(h.orchestrator.add(job).unwrap().wait()).await;
    let metadata = outcome.metadata().expect("walk completed");

    let kinds: Vec<&str> = metadata.steps().iter().map(|s| s.task_kind.as_str()).collect();
    assert_eq!(kinds, vec!["condition.command", "task.command"]);

    let raw = h
        .log_dir
        .path()
        .join(&metadata.data_label)
        .join("stacks.folded");
    assert_eq!(std::fs::read_to_string(raw).unwrap(), "main;loop 4\n");
}
