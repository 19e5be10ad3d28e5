// src/dag/scheduler_step.rs

//! Step-by-step result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single completion step.
///
/// Useful for tests that drive the scheduler by hand and assert on what
/// changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Whether the completion was applied. `false` for unknown tasks and
    /// tasks that were not in flight.
    pub accepted: bool,
    /// Tasks that became ready in this step, in enqueue order.
    pub newly_ready: Vec<TaskName>,
    /// Tasks marked skipped because of a failure in this step.
    pub newly_skipped: Vec<TaskName>,
    /// Clarify/retry tasks injected in this step.
    pub injected: Vec<TaskName>,
    /// Every registered task is now terminal.
    pub run_just_finished: bool,
}

/// Tasks taken off the ready queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// For the local worker pool (human and shell roles).
    pub local: Vec<ScheduledTask>,
    /// For the external AI subsystem.
    pub external: Vec<ScheduledTask>,
}

impl Dispatch {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.external.is_empty()
    }
}
