// crates/test-utils/src/lib.rs

//! Shared helpers for clampany's integration tests.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use clampany::logging::{LOG_ENV, run_log_layer};

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Initialise tracing once per test binary.
///
/// Console output goes through the test writer, filtered by `CLAMPANY_LOG`
/// (default `info`), so it only shows up for failing tests. The per-run log
/// file layer is installed as well, at `info`, so runs that attach a run
/// directory get their `log.txt` written as in the binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

        let console = fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_filter(filter);

        // Another harness may have installed a subscriber already.
        let _ = tracing_subscriber::registry()
            .with(console)
            .with(run_log_layer(LevelFilter::INFO))
            .try_init();
    });
}

/// Await `f`, failing after [`TEST_TIMEOUT`] instead of hanging the suite.
pub async fn with_timeout<F, T>(f: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .with_context(|| format!("test step timed out after {TEST_TIMEOUT:?}"))
}

/// Join a spawned run, failing on timeout or if the task panicked.
pub async fn join_with_timeout<T>(handle: JoinHandle<T>) -> Result<T> {
    with_timeout(handle)
        .await?
        .context("spawned task panicked or was cancelled")
}
