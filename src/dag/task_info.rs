// src/dag/task_info.rs

//! Live task records and the per-task state machine.

use std::fmt;

use crate::config::model::Task;
use crate::engine::TaskName;

/// Identity of a task inside one run.
///
/// Assigned monotonically as tasks are registered, planned tasks first (in
/// input order) and injected tasks afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// State of a task within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// Waiting for at least one dependency.
    Pending,
    /// All dependencies succeeded; queued for dispatch.
    Ready,
    /// Handed to a local worker.
    Running,
    /// Handed to the external AI subsystem; waiting for its completion signal.
    AwaitingExternal,
    Succeeded,
    Failed,
    /// Never dispatched because a (transitive) dependency failed.
    Skipped,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskRunState::Succeeded | TaskRunState::Failed | TaskRunState::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskRunState::Pending => "pending",
            TaskRunState::Ready => "ready",
            TaskRunState::Running => "running",
            TaskRunState::AwaitingExternal => "awaiting-external",
            TaskRunState::Succeeded => "succeeded",
            TaskRunState::Failed => "failed",
            TaskRunState::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOrigin {
    /// Part of the validated input graph.
    Planned,
    /// `<of>_clarify`, injected after `of` asked for clarification.
    Clarification { of: TaskName },
    /// `<of>_retry`, injected alongside the clarification task.
    Retry { of: TaskName },
}

/// Static task data plus the scheduler's bookkeeping for it.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    pub task: Task,
    pub origin: TaskOrigin,
    /// Clarification generation: 0 for planned tasks.
    pub depth: u32,
    /// Dependencies that have not succeeded yet.
    pub remaining: usize,
    /// Tasks that list this one in `depends_on`.
    pub children: Vec<TaskId>,
    pub state: TaskRunState,
    /// Set when `state == Skipped`: the failed task that caused it.
    pub skipped_because: Option<TaskName>,
}

impl TaskInfo {
    pub fn new(id: TaskId, task: Task, origin: TaskOrigin, depth: u32, remaining: usize) -> Self {
        Self {
            id,
            task,
            origin,
            depth,
            remaining,
            children: Vec::new(),
            state: TaskRunState::Pending,
            skipped_because: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }
}

/// A task the scheduler wants executed now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub task: Task,
    /// Outputs of the task's dependencies.
    pub input: String,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        &self.task.name
    }
}
