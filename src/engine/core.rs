// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the worker pool and the AI dispatcher
//! - persisting outputs and the run summary
//!
//! The core is the single writer of the run state. It is unit tested without
//! any Tokio, channels, filesystem, or processes.

use tracing::info;

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    CoreCommand, CoreStep, Slots, dispatch_ready, handle_external_completed,
    handle_task_finished,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    slots: Slots,
    queue_closed: bool,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            slots: Slots {
                in_flight: 0,
                capacity: options.max_parallel.max(1),
            },
            queue_closed: false,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Local tasks dispatched and not yet reported back.
    pub fn in_flight(&self) -> usize {
        self.slots.in_flight
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Dispatch the initial ready set.
    pub fn start(&mut self) -> CoreStep {
        info!(tasks = self.scheduler.len(), "starting run");
        let commands = dispatch_ready(&mut self.scheduler, &mut self.slots);
        self.finish_step(commands)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let commands = match event {
            RuntimeEvent::TaskFinished { task, outcome } => {
                handle_task_finished(&mut self.scheduler, &mut self.slots, task, outcome)
            }
            RuntimeEvent::ExternalCompleted { task, outcome } => {
                handle_external_completed(&mut self.scheduler, &mut self.slots, task, outcome)
            }
        };
        self.finish_step(commands)
    }

    fn finish_step(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        let finished = self.scheduler.is_finished();
        if finished && !self.queue_closed {
            self.queue_closed = true;
            info!(
                tasks = self.scheduler.len(),
                failures = self.scheduler.failures().len(),
                "all tasks terminal; closing dispatch queue"
            );
            commands.push(CoreCommand::CloseQueue);
        }

        CoreStep {
            commands,
            keep_running: !finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{Role, Task};
    use crate::dag::{ClarificationPolicy, ScheduledTask, TaskGraph};
    use crate::engine::TaskOutcome;
    use crate::types::RoleType;

    fn core(tasks: Vec<Task>, max_parallel: usize) -> CoreRuntime {
        let roles = vec![
            Role::new("dev", RoleType::Shell),
            Role::new("planner1", RoleType::Ai),
        ];
        let graph = TaskGraph::build(tasks).unwrap();
        let scheduler = Scheduler::new(&graph, &roles, ClarificationPolicy::default());
        CoreRuntime::new(scheduler, RuntimeOptions { max_parallel })
    }

    fn task(name: &str, deps: &[&str]) -> Task {
        let mut t = Task::new(name, "dev", "");
        t.command = Some(format!("echo {name}"));
        t.depends_on = deps.iter().map(|d| d.to_string()).collect();
        t
    }

    fn local_names(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchLocal(tasks) => Some(tasks.clone()),
                _ => None,
            })
            .flatten()
            .map(|t: ScheduledTask| t.task.name)
            .collect()
    }

    fn finished(task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskFinished {
            task: task.to_string(),
            outcome: TaskOutcome::Success(format!("{task} out")),
        }
    }

    #[test]
    fn start_dispatches_no_more_than_capacity() {
        let mut core = core(vec![task("a", &[]), task("b", &[]), task("c", &[])], 2);

        let step = core.start();
        assert_eq!(local_names(&step), vec!["a", "b"]);
        assert_eq!(core.in_flight(), 2);
        assert!(step.keep_running);

        let step = core.step(finished("a"));
        assert_eq!(local_names(&step), vec!["c"]);
        assert_eq!(core.in_flight(), 2);
    }

    #[test]
    fn success_persists_before_dispatching_children() {
        let mut core = core(vec![task("A", &[]), task("B", &["A"])], 1);
        core.start();

        let step = core.step(finished("A"));
        assert_eq!(
            step.commands[0],
            CoreCommand::PersistOutput {
                task: "A".to_string(),
                output: "A out".to_string(),
            }
        );
        assert_eq!(local_names(&step), vec!["B"]);
    }

    #[test]
    fn close_queue_is_issued_exactly_once() {
        let mut core = core(vec![task("A", &[])], 1);
        core.start();

        let step = core.step(finished("A"));
        assert!(!step.keep_running);
        assert!(step.commands.contains(&CoreCommand::CloseQueue));

        // A late duplicate is ignored and does not close again.
        let step = core.step(finished("A"));
        assert!(step.commands.is_empty());
        assert!(!step.keep_running);
    }

    #[test]
    fn failure_frees_the_slot_without_persisting() {
        let mut core = core(vec![task("E", &[]), task("F", &["E"])], 1);
        core.start();

        let step = core.step(RuntimeEvent::TaskFinished {
            task: "E".to_string(),
            outcome: TaskOutcome::Failed("exit status: 1".to_string()),
        });

        assert_eq!(step.commands, vec![CoreCommand::CloseQueue]);
        assert_eq!(core.in_flight(), 0);
        assert!(core.is_finished());
    }

    #[test]
    fn external_tasks_do_not_use_worker_slots() {
        let mut plan = Task::new("plan", "planner1", "plan it");
        plan.depends_on = Vec::new();
        let mut core = core(vec![plan, task("build", &["plan"])], 1);

        let step = core.start();
        assert!(matches!(&step.commands[0], CoreCommand::DispatchExternal(t) if t[0].task.name == "plan"));
        assert_eq!(core.in_flight(), 0);
        assert!(step.keep_running);

        let step = core.step(RuntimeEvent::ExternalCompleted {
            task: "plan".to_string(),
            outcome: TaskOutcome::Success("the plan".to_string()),
        });
        assert_eq!(local_names(&step), vec!["build"]);
    }

    #[test]
    fn empty_run_closes_immediately() {
        let graph = TaskGraph::build(Vec::new()).unwrap();
        let scheduler = Scheduler::new(&graph, &[], ClarificationPolicy::default());
        let mut core = CoreRuntime::new(scheduler, RuntimeOptions::default());

        let step = core.start();
        assert_eq!(step.commands, vec![CoreCommand::CloseQueue]);
        assert!(!step.keep_running);
    }
}
