// src/logging.rs

//! Logging setup for `clampany` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `CLAMPANY_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Two layers are installed:
//! - STDERR, so that stdout stays free for human prompts and dry-run output;
//! - the run log, `<run_dir>/log.txt`. It stays silent until a run directory
//!   is attached with [`attach_run_log`], then mirrors every event of the run
//!   without ANSI colours.

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use anyhow::{Context, Result, anyhow};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "CLAMPANY_LOG";

/// Name of the per-run log file inside the run directory.
pub const RUN_LOG_FILE: &str = "log.txt";

type RunLogSlot = Arc<Mutex<Option<RollingFileAppender>>>;

fn run_log_slot() -> &'static RunLogSlot {
    static SLOT: OnceLock<RunLogSlot> = OnceLock::new();
    SLOT.get_or_init(RunLogSlot::default)
}

fn lock(slot: &RunLogSlot) -> MutexGuard<'_, Option<RollingFileAppender>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer handed to the run-log layer. Drops output while no run is attached.
struct RunLogWriter {
    slot: RunLogSlot,
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock(&self.slot).as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.slot).as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Keeps the run log attached; dropping it detaches the file.
#[derive(Debug)]
#[must_use = "the run log is detached when the guard is dropped"]
pub struct RunLogGuard {
    _private: (),
}

impl Drop for RunLogGuard {
    fn drop(&mut self) {
        lock(run_log_slot()).take();
    }
}

/// Start mirroring log events into `<run_dir>/log.txt`.
///
/// The file is created (or appended to) right away, whether or not the
/// global subscriber carries the run-log layer.
pub fn attach_run_log(run_dir: &Path) -> Result<RunLogGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(RUN_LOG_FILE)
        .build(run_dir)
        .with_context(|| format!("creating {}", run_dir.join(RUN_LOG_FILE).display()))?;

    *lock(run_log_slot()) = Some(appender);
    Ok(RunLogGuard { _private: () })
}

/// Layer writing to the attached run log, if any.
pub fn run_log_layer<S>(level: LevelFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(|| RunLogWriter {
            slot: Arc::clone(run_log_slot()),
        })
        .with_filter(level)
}

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = resolve_level(cli_level, std::env::var(LOG_ENV).ok().as_deref());
    let filter = LevelFilter::from_level(level);

    let stderr = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stderr)
        .with(run_log_layer(filter))
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {e}"))?;

    Ok(())
}

fn resolve_level(cli_level: Option<LogLevel>, env_level: Option<&str>) -> tracing::Level {
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => env_level
            .and_then(parse_level_str)
            .unwrap_or(tracing::Level::INFO),
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_env() {
        assert_eq!(
            resolve_level(Some(LogLevel::Debug), Some("error")),
            tracing::Level::DEBUG
        );
        assert_eq!(resolve_level(None, Some(" WARNING ")), tracing::Level::WARN);
        assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
        assert_eq!(resolve_level(None, None), tracing::Level::INFO);
    }

    #[test]
    fn attached_run_log_receives_writes_until_detached() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = RunLogWriter {
            slot: Arc::clone(run_log_slot()),
        };

        let guard = attach_run_log(dir.path()).unwrap();
        writer.write_all(b"INFO task succeeded\n").unwrap();
        drop(guard);
        writer.write_all(b"after detach\n").unwrap();

        let text = std::fs::read_to_string(dir.path().join(RUN_LOG_FILE)).unwrap();
        assert_eq!(text, "INFO task succeeded\n");
    }
}
