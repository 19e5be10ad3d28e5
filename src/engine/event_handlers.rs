// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::debug;

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::{TaskName, TaskOutcome};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the local worker pool.
    DispatchLocal(Vec<ScheduledTask>),
    /// Hand these tasks to the external AI subsystem.
    DispatchExternal(Vec<ScheduledTask>),
    /// Persist the output of a succeeded task.
    PersistOutput { task: TaskName, output: String },
    /// Every task is terminal: close the dispatch queue. Issued once per run.
    CloseQueue,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Counters the core keeps next to the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slots {
    /// Tasks handed to local workers whose completion has not arrived yet.
    pub in_flight: usize,
    /// Size of the worker pool.
    pub capacity: usize,
}

impl Slots {
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.in_flight)
    }
}

/// Handle a completion reported by a local worker.
pub fn handle_task_finished(
    scheduler: &mut Scheduler,
    slots: &mut Slots,
    task: TaskName,
    outcome: TaskOutcome,
) -> Vec<CoreCommand> {
    let persist = persist_command(&task, &outcome);
    let step = scheduler.complete(&task, outcome);
    if !step.accepted {
        return Vec::new();
    }
    slots.in_flight = slots.in_flight.saturating_sub(1);

    after_completion(scheduler, slots, &task, step, persist)
}

/// Handle a completion signalled by the external AI subsystem.
pub fn handle_external_completed(
    scheduler: &mut Scheduler,
    slots: &mut Slots,
    task: TaskName,
    outcome: TaskOutcome,
) -> Vec<CoreCommand> {
    let persist = persist_command(&task, &outcome);
    let step = scheduler.complete_external(&task, outcome);
    if !step.accepted {
        return Vec::new();
    }

    after_completion(scheduler, slots, &task, step, persist)
}

/// Take as much from the ready queue as the free worker slots allow.
pub fn dispatch_ready(scheduler: &mut Scheduler, slots: &mut Slots) -> Vec<CoreCommand> {
    let dispatch = scheduler.take_ready(slots.free());
    let mut commands = Vec::new();

    if !dispatch.external.is_empty() {
        commands.push(CoreCommand::DispatchExternal(dispatch.external));
    }
    if !dispatch.local.is_empty() {
        slots.in_flight += dispatch.local.len();
        commands.push(CoreCommand::DispatchLocal(dispatch.local));
    }

    commands
}

fn persist_command(task: &str, outcome: &TaskOutcome) -> Option<CoreCommand> {
    match outcome {
        TaskOutcome::Success(output) => Some(CoreCommand::PersistOutput {
            task: task.to_string(),
            output: output.clone(),
        }),
        TaskOutcome::Failed(_) => None,
    }
}

fn after_completion(
    scheduler: &mut Scheduler,
    slots: &mut Slots,
    task: &str,
    step: SchedulerStep,
    persist: Option<CoreCommand>,
) -> Vec<CoreCommand> {
    debug!(
        task = %task,
        newly_ready = ?step.newly_ready,
        newly_skipped = ?step.newly_skipped,
        injected = ?step.injected,
        "completion applied"
    );

    let mut commands: Vec<CoreCommand> = persist.into_iter().collect();
    commands.extend(dispatch_ready(scheduler, slots));
    commands
}
