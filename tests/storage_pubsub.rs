// tests/storage_pubsub.rs

use probeflow::engine::{InFlightRegistry, JobCompleteEvent, RunMetadata, Shutdown, StepRecord};
use probeflow::errors::ProbeflowError;
use probeflow::pubsub::{BroadcastPublisher, JOB_COMPLETE_TOPIC, Publisher};
use probeflow::storage::{LocalStore, MemoryStore, MetadataStore, open_store_by_name};
use probeflow::types::{ParserKind, StorageEngine};
use probeflow_test_utils::with_timeout;

fn sample_metadata(job: &str) -> RunMetadata {
    let mut metadata = RunMetadata::new(job);
    metadata.push(StepRecord::new("condition.always", "", None));
    metadata.push(StepRecord::new(
        "task.probe",
        "io_latency/*",
        Some(ParserKind::IoLatency),
    ));
    metadata
}

#[test]
fn local_store_writes_one_manifest_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let metadata = sample_metadata("disk");

    store.save(1700, &metadata).unwrap();

    let path = dir.path().join("metadata").join("disk").join("1700.json");
    assert_eq!(store.manifest_path("disk", 1700), path);
    assert!(path.is_file());

    assert_eq!(store.load("disk", 1700).unwrap(), Some(metadata));
    assert_eq!(store.load("disk", 1701).unwrap(), None);
    assert_eq!(store.load("other", 1700).unwrap(), None);
}

#[test]
fn memory_store_keeps_saves_in_order() {
    let store = MemoryStore::new();
    let first = sample_metadata("a");
    let second = sample_metadata("b");

    store.save(1, &first).unwrap();
    store.save(2, &second).unwrap();

    assert_eq!(store.engine(), StorageEngine::Memory);
    let saved = store.saved();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0], (1, first.clone()));
    assert_eq!(store.load("a", 1).unwrap(), Some(first));
    assert_eq!(store.load("a", 2).unwrap(), None);
}

#[test]
fn stores_open_by_engine_name() {
    let dir = tempfile::tempdir().unwrap();

    let local = open_store_by_name("local", dir.path()).unwrap();
    assert_eq!(local.engine(), StorageEngine::Local);
    let memory = open_store_by_name(" Memory ", dir.path()).unwrap();
    assert_eq!(memory.engine(), StorageEngine::Memory);

    match open_store_by_name("bogus", dir.path()) {
        Err(ProbeflowError::ConfigError(msg)) => assert!(msg.contains("bogus")),
        Err(other) => panic!("expected config error, got {other:?}"),
        Ok(_) => panic!("unknown engine was accepted"),
    }
}

#[test]
fn manifest_json_uses_camel_case_keys() {
    let event = JobCompleteEvent {
        timestamp: 99,
        metadata: sample_metadata("disk"),
    };
    let bytes = event.to_bytes().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["timestamp"], 99);
    assert_eq!(json["metadata"]["jobName"], "disk");
    assert!(json["metadata"]["dataLabel"].is_string());
    let steps = &json["metadata"]["steps"];
    assert_eq!(steps[0]["taskKind"], "condition.always");
    assert!(steps[0].get("parser").is_none());
    assert_eq!(steps[1]["outputPathSuffix"], "io_latency/*");
    assert_eq!(steps[1]["parser"], "io_latency");

    assert_eq!(JobCompleteEvent::from_bytes(&bytes).unwrap(), event);
}

#[test]
fn every_walk_gets_a_distinct_data_label() {
    let a = RunMetadata::new("job");
    let b = RunMetadata::new("job");
    assert_ne!(a.data_label, b.data_label);
}

#[test]
fn publishing_without_subscribers_succeeds() {
    let publisher = BroadcastPublisher::default();
    assert_eq!(publisher.subscriber_count(), 0);
    publisher.publish(JOB_COMPLETE_TOPIC, b"{}".to_vec()).unwrap();
}

#[tokio::test]
async fn subscribers_receive_published_messages() {
    let publisher = BroadcastPublisher::new(4);
    let mut rx = publisher.subscribe();
    assert_eq!(publisher.subscriber_count(), 1);

    publisher.publish("topic", b"payload".to_vec()).unwrap();

    let message = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(message.topic, "topic");
    assert_eq!(message.payload, b"payload".to_vec());
}

#[test]
fn registry_rejects_duplicates_until_guard_drops() {
    let registry = InFlightRegistry::new();
    let guard = registry.try_insert("disk", 10).unwrap();
    assert_eq!(guard.name(), "disk");
    assert!(registry.contains("disk"));
    assert_eq!(registry.started_at("disk"), Some(10));

    let err = registry.try_insert("disk", 11).unwrap_err();
    assert!(matches!(err, ProbeflowError::AlreadyRunning(name) if name == "disk"));
    assert_eq!(registry.started_at("disk"), Some(10));

    let other = registry.try_insert("cpu", 12).unwrap();
    assert_eq!(registry.names(), vec!["cpu".to_string(), "disk".to_string()]);

    drop(guard);
    assert!(!registry.contains("disk"));
    assert_eq!(registry.len(), 1);

    drop(other);
    assert!(registry.is_empty());
    registry.try_insert("disk", 13).unwrap();
}

#[tokio::test]
async fn shutdown_is_idempotent_and_seen_by_late_subscribers() {
    let shutdown = Shutdown::new();
    let mut early = shutdown.subscribe();
    assert!(!shutdown.is_requested());
    assert!(!early.is_requested());

    shutdown.request();
    shutdown.request();

    assert!(shutdown.is_requested());
    with_timeout(early.recv()).await;

    let mut late = shutdown.subscribe();
    assert!(late.is_requested());
    with_timeout(late.recv()).await;
}
