//! Shared helpers for probeflow's integration tests: tracing setup, timeouts,
//! config builders and fake probe loaders.

pub mod builders;
pub mod fakes;

pub use builders::{JobBuilder, RoutineBuilder};
pub use fakes::{
    FakeProbeLoader, Harness, LoaderScript, LoaderStats, RecordingPublisher, fake_registry,
};

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness capture.
///
/// `RUST_LOG` overrides the default of `probeflow=debug` plus warnings from
/// everything else. Output only shows for failing tests unless run with
/// `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,probeflow=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_TIMEOUT:?}"),
    }
}
