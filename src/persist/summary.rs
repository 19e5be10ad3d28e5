// src/persist/summary.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dag::Scheduler;
use crate::engine::TaskName;
use crate::errors::Result;
use crate::types::RunStatus;

/// Record written once at the end of a run (`run.toml`).
///
/// ```toml
/// run_id = "6f1c..."
/// status = "fail"
/// timestamp = "2026-10-19T12:00:00Z"
///
/// [failures]
/// E = "command for task 'E' exited with exit status: 1"
///
/// [skipped]
/// F = "E"
///
/// [persistence_errors]
///
/// [tasks]
/// E = "failed"
/// F = "skipped"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub timestamp: DateTime<Utc>,

    /// Failed task -> error text.
    #[serde(default)]
    pub failures: BTreeMap<TaskName, String>,

    /// Skipped task -> the failed task that caused the skip.
    #[serde(default)]
    pub skipped: BTreeMap<TaskName, TaskName>,

    /// Task -> error from persisting its output.
    #[serde(default)]
    pub persistence_errors: BTreeMap<TaskName, String>,

    /// Final state of every task, injected ones included.
    #[serde(default)]
    pub tasks: BTreeMap<TaskName, String>,
}

impl RunSummary {
    /// Snapshot of the scheduler's run state.
    ///
    /// Status is `success` only when nothing failed and nothing was skipped.
    /// Persistence errors do not affect it.
    pub fn from_scheduler(
        run_id: impl Into<String>,
        scheduler: &Scheduler,
        persistence_errors: BTreeMap<TaskName, String>,
    ) -> Self {
        let failures = scheduler.failures().clone();
        let skipped = scheduler.skipped();
        let status = if failures.is_empty() && skipped.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Fail
        };

        Self {
            run_id: run_id.into(),
            status,
            timestamp: Utc::now(),
            failures,
            skipped,
            persistence_errors,
            tasks: scheduler
                .states()
                .into_iter()
                .map(|(name, state)| (name, state.as_str().to_string()))
                .collect(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
