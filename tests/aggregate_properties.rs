// tests/aggregate_properties.rs

use std::collections::HashMap;

use proptest::prelude::*;

use probeflow::parse::io_latency::{LatencyRecord, Operation, Rollup, aggregate};

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Read),
        Just(Operation::Write),
        Just(Operation::Other),
    ]
}

fn record() -> impl Strategy<Value = LatencyRecord> {
    (
        1u32..6,
        prop::sample::select(vec!["sda", "sdb", "nvme0n1"]),
        operation(),
        any::<bool>(),
        0u64..1_000_000,
    )
        .prop_map(|(pid, device, op, sync, lat_us)| LatencyRecord {
            pid,
            comm: format!("proc{pid}"),
            device: device.to_string(),
            op,
            sync,
            lat_us,
        })
}

fn check_rollup(rollup: &Rollup, lats: &[u64]) {
    assert_eq!(rollup.total_ios as usize, lats.len());
    assert_eq!(rollup.bucket_total(), rollup.total_ios);
    assert!(lats.iter().all(|l| rollup.lat_low_us <= *l && *l <= rollup.lat_high_us));
    assert_eq!(rollup.lat_low_us, *lats.iter().min().unwrap());
    assert_eq!(rollup.lat_high_us, *lats.iter().max().unwrap());

    let sum: u128 = lats.iter().map(|l| u128::from(*l)).sum();
    assert_eq!(u128::from(rollup.lat_avg_us), sum / lats.len() as u128);
}

proptest! {
    #[test]
    fn every_tier_satisfies_rollup_invariants(records in prop::collection::vec(record(), 1..200)) {
        let snap = aggregate(&records).unwrap();

        let all: Vec<u64> = records.iter().map(|r| r.lat_us).collect();
        check_rollup(&snap.all, &all);

        let mut by_pid: HashMap<u32, Vec<u64>> = HashMap::new();
        let mut by_dev: HashMap<String, Vec<u64>> = HashMap::new();
        for r in &records {
            by_pid.entry(r.pid).or_default().push(r.lat_us);
            by_dev.entry(r.device.clone()).or_default().push(r.lat_us);
        }

        prop_assert_eq!(snap.per_pid.len(), by_pid.len());
        prop_assert_eq!(snap.per_dev.len(), by_dev.len());

        for (pid, lats) in &by_pid {
            check_rollup(&snap.per_pid[pid].blk_lat, lats);
        }
        for (dev, lats) in &by_dev {
            check_rollup(&snap.per_dev[dev], lats);
        }

        let pid_total: u64 = snap.per_pid.values().map(|p| p.blk_lat.total_ios).sum();
        let dev_total: u64 = snap.per_dev.values().map(|d| d.total_ios).sum();
        prop_assert_eq!(pid_total, snap.all.total_ios);
        prop_assert_eq!(dev_total, snap.all.total_ios);
    }
}
