// src/engine/mod.rs

//! Orchestration engine for clampany.
//!
//! This module ties together:
//! - the scheduler run state (`dag::Scheduler`)
//! - the main runtime event loop that reacts to:
//!   - completions reported by local workers
//!   - completion signals from the external AI subsystem
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Result;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task execution for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Task output text.
    Success(String),
    /// Error description.
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Number of local workers, and the cap on tasks handed to them at once.
    pub max_parallel: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { max_parallel: 2 }
    }
}

/// Events flowing into the runtime from workers and the AI subsystem.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A local worker finished executing a task.
    TaskFinished { task: TaskName, outcome: TaskOutcome },
    /// The external AI subsystem reported a result for a task it was handed.
    ExternalCompleted { task: TaskName, outcome: TaskOutcome },
}

/// Handle used by the external AI subsystem to report results.
///
/// Cloneable; every clone feeds the same runtime.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl CompletionHandle {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    /// Report that `task` finished with `output`.
    pub async fn complete(&self, task: impl Into<TaskName>, output: impl Into<String>) -> Result<()> {
        self.send(task.into(), TaskOutcome::Success(output.into()))
            .await
    }

    /// Report that `task` failed with `error`.
    pub async fn fail(&self, task: impl Into<TaskName>, error: impl Into<String>) -> Result<()> {
        self.send(task.into(), TaskOutcome::Failed(error.into())).await
    }

    async fn send(&self, task: TaskName, outcome: TaskOutcome) -> Result<()> {
        debug!(task = %task, success = outcome.is_success(), "external completion signalled");
        self.tx
            .send(RuntimeEvent::ExternalCompleted { task, outcome })
            .await?;
        Ok(())
    }
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::{Runtime, run_tasks};
