// tests/parse_run.rs

use std::path::Path;

use probeflow::engine::{JobCompleteEvent, RunMetadata, StepRecord};
use probeflow::errors::ProbeflowError;
use probeflow::parse::{parse_run, spawn_parse_worker};
use probeflow::pubsub::{BroadcastPublisher, JOB_COMPLETE_TOPIC, Publisher};
use probeflow::types::ParserKind;
use probeflow::view::{latest_timestamp, read_overview, read_snapshot, snapshot_path};
use probeflow_test_utils::{init_tracing, with_timeout};

const IO_RECORDS: &str = r#"[
    {"pid": 1, "comm": "a", "device": "sda", "op": "read", "latUs": 10},
    {"pid": 2, "comm": "b", "device": "sda", "op": "write", "sync": true, "latUs": 30}
]"#;

fn write_raw(log_dir: &Path, label: &str, rel: &str, contents: &str) {
    let path = log_dir.join(label).join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn event(label: &str, timestamp: i64, steps: Vec<StepRecord>) -> JobCompleteEvent {
    let mut metadata = RunMetadata::new("job");
    metadata.data_label = label.to_string();
    for step in steps {
        metadata.push(step);
    }
    JobCompleteEvent {
        timestamp,
        metadata,
    }
}

#[test]
fn parses_each_step_with_a_parser() {
    init_tracing();
    let log = tempfile::tempdir().unwrap();
    let view = tempfile::tempdir().unwrap();

    write_raw(log.path(), "run1", "io_latency/io_latency.json", IO_RECORDS);
    write_raw(log.path(), "run1", "cpu_profile/cpu_profile.folded", "a;b;c 5\na;b;d 3\n");

    let ev = event(
        "run1",
        1000,
        vec![
            StepRecord::new("condition.always", "", None),
            StepRecord::new("task.probe", "io_latency/*", Some(ParserKind::IoLatency)),
            StepRecord::new("task.probe", "cpu_profile/*", Some(ParserKind::CpuProfile)),
        ],
    );

    let report = parse_run(log.path(), view.path(), &ev);
    assert!(report.is_clean(), "failures: {:?}", report.failed);
    assert_eq!(report.written.len(), 2);

    let io_path = snapshot_path(view.path(), ParserKind::IoLatency, 1000);
    assert!(io_path.ends_with("io_latency/1000/blk_ios.json"));
    let io = read_snapshot(view.path(), ParserKind::IoLatency, 1000).unwrap();
    assert_eq!(io["all"]["totalIos"], 2);
    assert_eq!(io["all"]["latAvgUs"], 20);

    let cpu = read_snapshot(view.path(), ParserKind::CpuProfile, 1000).unwrap();
    assert_eq!(cpu["name"], "all");
    assert_eq!(cpu["value"], 8);

    let overview = read_overview(view.path(), ParserKind::IoLatency).unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].timestamp, 1000);
    assert_eq!(overview[0].value, 20);
    assert!(overview[0].triggered);

    let cpu_overview = read_overview(view.path(), ParserKind::CpuProfile).unwrap();
    assert_eq!(cpu_overview[0].value, 8);
}

#[test]
fn failed_parse_leaves_earlier_snapshots_untouched() {
    init_tracing();
    let log = tempfile::tempdir().unwrap();
    let view = tempfile::tempdir().unwrap();
    let step = || StepRecord::new("task.probe", "io_latency/*", Some(ParserKind::IoLatency));

    write_raw(log.path(), "good", "io_latency/io_latency.json", IO_RECORDS);
    let first = parse_run(log.path(), view.path(), &event("good", 100, vec![step()]));
    assert!(first.is_clean());
    let before = std::fs::read(snapshot_path(view.path(), ParserKind::IoLatency, 100)).unwrap();

    write_raw(log.path(), "bad", "io_latency/io_latency.json", "{ truncated");
    let second = parse_run(log.path(), view.path(), &event("bad", 200, vec![step()]));
    assert_eq!(second.failed.len(), 1);
    assert!(matches!(second.failed[0].1, ProbeflowError::ParseError(_)));

    let after = std::fs::read(snapshot_path(view.path(), ParserKind::IoLatency, 100)).unwrap();
    assert_eq!(before, after);
    assert!(!snapshot_path(view.path(), ParserKind::IoLatency, 200).exists());
    assert_eq!(read_overview(view.path(), ParserKind::IoLatency).unwrap().len(), 1);
    assert_eq!(
        latest_timestamp(view.path(), ParserKind::IoLatency).unwrap(),
        Some(100)
    );
}

#[test]
fn step_without_raw_files_reports_empty_input() {
    let log = tempfile::tempdir().unwrap();
    let view = tempfile::tempdir().unwrap();

    let ev = event(
        "nothing",
        5,
        vec![StepRecord::new("task.probe", "cpu_profile/*", Some(ParserKind::CpuProfile))],
    );
    let report = parse_run(log.path(), view.path(), &ev);

    assert!(report.written.is_empty());
    assert!(matches!(report.failed[0].1, ProbeflowError::EmptyInput(_)));
    assert_eq!(latest_timestamp(view.path(), ParserKind::CpuProfile).unwrap(), None);
}

#[test]
fn latest_timestamp_is_numeric_maximum() {
    let log = tempfile::tempdir().unwrap();
    let view = tempfile::tempdir().unwrap();
    let step = || StepRecord::new("task.command", "out.folded", Some(ParserKind::CpuProfile));

    for (label, ts) in [("r1", 9), ("r2", 10), ("r3", 2)] {
        write_raw(log.path(), label, "out.folded", "x 1\n");
        assert!(parse_run(log.path(), view.path(), &event(label, ts, vec![step()])).is_clean());
    }

    assert_eq!(
        latest_timestamp(view.path(), ParserKind::CpuProfile).unwrap(),
        Some(10)
    );
    let timestamps: Vec<i64> = read_overview(view.path(), ParserKind::CpuProfile)
        .unwrap()
        .iter()
        .map(|e| e.timestamp)
        .collect();
    assert_eq!(timestamps, vec![9, 10, 2]);
}

#[tokio::test]
async fn worker_parses_published_runs_until_closed() {
    init_tracing();
    let log = tempfile::tempdir().unwrap();
    let view = tempfile::tempdir().unwrap();

    write_raw(log.path(), "run", "io_latency/io_latency.json", IO_RECORDS);
    let ev = event(
        "run",
        42,
        vec![StepRecord::new("task.probe", "io_latency/*", Some(ParserKind::IoLatency))],
    );

    let publisher = BroadcastPublisher::new(8);
    let worker = spawn_parse_worker(
        publisher.subscribe(),
        log.path().to_path_buf(),
        view.path().to_path_buf(),
    );

    publisher.publish("other_topic", b"ignored".to_vec()).unwrap();
    publisher
        .publish(JOB_COMPLETE_TOPIC, ev.to_bytes().unwrap())
        .unwrap();
    drop(publisher);

    with_timeout(worker).await.unwrap();

    assert_eq!(
        latest_timestamp(view.path(), ParserKind::IoLatency).unwrap(),
        Some(42)
    );
}
