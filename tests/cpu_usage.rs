// tests/cpu_usage.rs

use std::time::Duration;

use probeflow::errors::ProbeflowError;
use probeflow::task::condition::{CpuTimes, CpuUsageCondition, busy_percent, parse_proc_stat};
use probeflow::task::{Condition, ExecContext};
use probeflow_test_utils::init_tracing;

const PROC_STAT: &str = "\
cpu  100 20 80 700 50 10 40 0 0 0
cpu0 50 10 40 350 25 5 20 0 0 0
intr 12345
ctxt 6789
";

#[test]
fn aggregate_line_counts_iowait_as_idle() {
    let times = parse_proc_stat(PROC_STAT).unwrap();
    assert_eq!(times.total, 1000);
    assert_eq!(times.idle, 750);
}

#[test]
fn missing_aggregate_line_is_parse_error() {
    let err = parse_proc_stat("cpu0 1 2 3 4\n").unwrap_err();
    assert!(matches!(err, ProbeflowError::ParseError(_)));
}

#[test]
fn short_aggregate_line_is_parse_error() {
    let err = parse_proc_stat("cpu  1 2 3\n").unwrap_err();
    assert!(matches!(err, ProbeflowError::ParseError(_)));
}

#[test]
fn overflowing_counters_are_parse_errors() {
    let err = parse_proc_stat("cpu  18446744073709551615 1 0 0\n").unwrap_err();
    assert!(matches!(err, ProbeflowError::ParseError(_)));
}

#[test]
fn busy_percent_uses_deltas() {
    let before = CpuTimes {
        total: 1000,
        idle: 750,
    };
    let after = CpuTimes {
        total: 1200,
        idle: 800,
    };
    assert!((busy_percent(before, after) - 75.0).abs() < f64::EPSILON);
}

#[test]
fn busy_percent_without_elapsed_time_is_zero() {
    let t = CpuTimes {
        total: 10,
        idle: 5,
    };
    assert_eq!(busy_percent(t, t), 0.0);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn zero_threshold_is_met_and_writes_report() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let ctx = ExecContext::new(dir.path(), "run");

    let condition = CpuUsageCondition::new(0.0, Duration::from_millis(50));
    condition.check(&ctx).await.unwrap();

    let report: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("run").join("cpu_usage.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["triggered"], serde_json::Value::Bool(true));
    assert_eq!(report["thresholdPercent"], serde_json::json!(0.0));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn unreachable_threshold_is_unmet() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let ctx = ExecContext::new(dir.path(), "run");

    let condition = CpuUsageCondition::new(101.0, Duration::from_millis(50));
    let err = condition.check(&ctx).await.unwrap_err();
    assert!(err.is_condition_unmet());
}
