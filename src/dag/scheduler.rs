// src/dag/scheduler.rs

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::config::model::{Role, Task};
use crate::dag::clarify::{self, ClarificationPolicy};
use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::{Dispatch, SchedulerStep};
use crate::dag::task_info::{ScheduledTask, TaskId, TaskInfo, TaskOrigin, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};
use crate::types::RoleType;

/// Run state for one execution of a task graph.
///
/// It is responsible for:
/// - tracking the remaining-dependency count of every task
/// - keeping the FIFO ready queue
/// - recording results, failures and skipped dependents
/// - injecting clarify/retry tasks into the live bookkeeping
///
/// The registry is append-only: tasks get monotonically increasing
/// [`TaskId`]s and are never removed. The planning [`TaskGraph`] it was seeded
/// from is not touched.
#[derive(Debug)]
pub struct Scheduler {
    tasks: Vec<TaskInfo>,
    index: HashMap<TaskName, TaskId>,
    role_types: HashMap<String, RoleType>,
    policy: ClarificationPolicy,
    ready: VecDeque<TaskId>,
    results: BTreeMap<TaskName, String>,
    failures: BTreeMap<TaskName, String>,
    terminal: usize,
}

impl Scheduler {
    /// Seed a scheduler from a validated graph.
    ///
    /// Tasks without dependencies are enqueued immediately, in name order.
    pub fn new(graph: &TaskGraph, roles: &[Role], policy: ClarificationPolicy) -> Self {
        let role_types = roles
            .iter()
            .map(|r| (r.name.clone(), r.role_type))
            .collect();

        let mut scheduler = Self {
            tasks: Vec::with_capacity(graph.len()),
            index: HashMap::with_capacity(graph.len()),
            role_types,
            policy,
            ready: VecDeque::new(),
            results: BTreeMap::new(),
            failures: BTreeMap::new(),
            terminal: 0,
        };

        for task in graph.tasks() {
            let remaining = task.unique_dependencies().len();
            scheduler.register(task.clone(), TaskOrigin::Planned, 0, remaining);
        }

        for info in graph.tasks() {
            let child = scheduler.index[&info.name];
            for dep in info.unique_dependencies() {
                let parent = scheduler.index[dep];
                scheduler.tasks[parent.0].children.push(child);
            }
        }

        let mut roots: Vec<TaskId> = scheduler
            .tasks
            .iter()
            .filter(|t| t.remaining == 0)
            .map(|t| t.id)
            .collect();
        scheduler.enqueue_sorted(&mut roots);

        debug!(
            tasks = scheduler.tasks.len(),
            ready = scheduler.ready.len(),
            "scheduler seeded"
        );

        scheduler
    }

    /// Number of registered tasks, including injected ones.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks in a terminal state.
    pub fn terminal_count(&self) -> usize {
        self.terminal
    }

    /// Every registered task is terminal.
    pub fn is_finished(&self) -> bool {
        self.terminal == self.tasks.len()
    }

    /// Number of tasks waiting in the ready queue.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.info(task).map(|i| i.state)
    }

    pub fn task(&self, task: &str) -> Option<&Task> {
        self.info(task).map(|i| &i.task)
    }

    pub fn origin_of(&self, task: &str) -> Option<&TaskOrigin> {
        self.info(task).map(|i| &i.origin)
    }

    /// Task names in registration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name())
    }

    pub fn results(&self) -> &BTreeMap<TaskName, String> {
        &self.results
    }

    pub fn failures(&self) -> &BTreeMap<TaskName, String> {
        &self.failures
    }

    /// Skipped tasks mapped to the failed task that starved them.
    pub fn skipped(&self) -> BTreeMap<TaskName, TaskName> {
        self.tasks
            .iter()
            .filter_map(|t| {
                t.skipped_because
                    .as_ref()
                    .map(|cause| (t.task.name.clone(), cause.clone()))
            })
            .collect()
    }

    /// Final (or current) state of every task, keyed by name.
    pub fn states(&self) -> BTreeMap<TaskName, TaskRunState> {
        self.tasks
            .iter()
            .map(|t| (t.task.name.clone(), t.state))
            .collect()
    }

    /// Take tasks off the ready queue.
    ///
    /// AI-role tasks are always taken and move to `AwaitingExternal`. At most
    /// `free_slots` other tasks are taken and move to `Running`; the rest stay
    /// queued in their original order.
    pub fn take_ready(&mut self, free_slots: usize) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let mut kept = VecDeque::with_capacity(self.ready.len());

        while let Some(id) = self.ready.pop_front() {
            if self.is_external(id) {
                self.tasks[id.0].state = TaskRunState::AwaitingExternal;
                debug!(task = %self.tasks[id.0].name(), "handing task to external subsystem");
                dispatch.external.push(self.scheduled(id));
            } else if dispatch.local.len() < free_slots {
                self.tasks[id.0].state = TaskRunState::Running;
                debug!(task = %self.tasks[id.0].name(), "dispatching task to worker");
                dispatch.local.push(self.scheduled(id));
            } else {
                kept.push_back(id);
            }
        }

        self.ready = kept;
        dispatch
    }

    /// Record the outcome of a task run by a local worker.
    pub fn complete(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.finish(task, outcome, TaskRunState::Running)
    }

    /// Record the outcome of a task handled by the external AI subsystem.
    pub fn complete_external(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.finish(task, outcome, TaskRunState::AwaitingExternal)
    }

    fn finish(&mut self, task: &str, outcome: TaskOutcome, expected: TaskRunState) -> SchedulerStep {
        let Some(&id) = self.index.get(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        let state = self.tasks[id.0].state;
        if state != expected {
            debug!(
                task = %task,
                state = %state,
                expected = %expected,
                "completion for task that is not in flight; ignoring"
            );
            return SchedulerStep::default();
        }

        let mut step = SchedulerStep {
            accepted: true,
            ..SchedulerStep::default()
        };

        match outcome {
            TaskOutcome::Success(output) => {
                self.mark_terminal(id, TaskRunState::Succeeded);
                info!(task = %task, "task succeeded");

                if self.policy.requests_clarification(&output) {
                    step.injected = self.inject_clarification(id, &output);
                }
                self.results.insert(task.to_string(), output);

                step.newly_ready = self.release_children(id);
            }
            TaskOutcome::Failed(error) => {
                self.mark_terminal(id, TaskRunState::Failed);
                warn!(task = %task, error = %error, "task failed; skipping dependents");
                self.failures.insert(task.to_string(), error);

                step.newly_skipped = self.skip_dependents(id);
            }
        }

        step.run_just_finished = self.is_finished();
        step
    }

    fn info(&self, task: &str) -> Option<&TaskInfo> {
        self.index.get(task).map(|id| &self.tasks[id.0])
    }

    fn register(&mut self, task: Task, origin: TaskOrigin, depth: u32, remaining: usize) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.index.insert(task.name.clone(), id);
        self.tasks.push(TaskInfo::new(id, task, origin, depth, remaining));
        id
    }

    fn mark_terminal(&mut self, id: TaskId, state: TaskRunState) {
        debug_assert!(state.is_terminal());
        self.tasks[id.0].state = state;
        self.terminal += 1;
    }

    fn is_external(&self, id: TaskId) -> bool {
        let role = &self.tasks[id.0].task.role;
        self.role_types.get(role) == Some(&RoleType::Ai)
    }

    /// Mark the given tasks `Ready` and append them to the queue in name order.
    fn enqueue_sorted(&mut self, ids: &mut [TaskId]) {
        ids.sort_by(|a, b| self.tasks[a.0].name().cmp(self.tasks[b.0].name()));
        for &id in ids.iter() {
            self.tasks[id.0].state = TaskRunState::Ready;
            self.ready.push_back(id);
        }
    }

    fn release_children(&mut self, id: TaskId) -> Vec<TaskName> {
        let children = self.tasks[id.0].children.clone();
        let mut freed = Vec::new();

        for child in children {
            let info = &mut self.tasks[child.0];
            info.remaining = info.remaining.saturating_sub(1);
            if info.remaining == 0 && info.state == TaskRunState::Pending {
                freed.push(child);
            }
        }

        self.enqueue_sorted(&mut freed);
        freed
            .into_iter()
            .map(|c| self.tasks[c.0].task.name.clone())
            .collect()
    }

    /// Mark every non-terminal transitive dependent of `failed` as skipped.
    fn skip_dependents(&mut self, failed: TaskId) -> Vec<TaskName> {
        let cause = self.tasks[failed.0].task.name.clone();
        let mut stack = self.tasks[failed.0].children.clone();
        let mut skipped = Vec::new();

        while let Some(id) = stack.pop() {
            if self.tasks[id.0].state.is_terminal() {
                continue;
            }
            self.mark_terminal(id, TaskRunState::Skipped);
            self.tasks[id.0].skipped_because = Some(cause.clone());
            debug!(
                task = %self.tasks[id.0].name(),
                failed_dependency = %cause,
                "skipping task: dependency failed"
            );
            skipped.push(self.tasks[id.0].task.name.clone());
            stack.extend(self.tasks[id.0].children.iter().copied());
        }

        skipped.sort();
        skipped
    }

    /// Register `<name>_clarify` (already satisfied, enqueued at once) and
    /// `<name>_retry` (waiting on the clarify task).
    fn inject_clarification(&mut self, id: TaskId, output: &str) -> Vec<TaskName> {
        let parent = &self.tasks[id.0];
        let parent_name = parent.task.name.clone();

        if parent.depth >= self.policy.max_rounds {
            warn!(
                task = %parent_name,
                rounds = parent.depth,
                "clarification requested but round limit reached; not injecting"
            );
            return Vec::new();
        }

        let pair = clarify::synthesize(&self.policy, &parent.task, output);
        let depth = parent.depth + 1;

        for name in [&pair.clarify.name, &pair.retry.name] {
            if self.index.contains_key(name) {
                warn!(
                    task = %parent_name,
                    existing = %name,
                    "clarification requested but task name already taken; not injecting"
                );
                return Vec::new();
            }
        }

        let clarify_name = pair.clarify.name.clone();
        let retry_name = pair.retry.name.clone();

        let clarify_id = self.register(
            pair.clarify,
            TaskOrigin::Clarification {
                of: parent_name.clone(),
            },
            depth,
            0,
        );
        let retry_id = self.register(
            pair.retry,
            TaskOrigin::Retry {
                of: parent_name.clone(),
            },
            depth,
            1,
        );
        self.tasks[clarify_id.0].children.push(retry_id);
        self.enqueue_sorted(&mut [clarify_id]);

        info!(
            task = %parent_name,
            clarify = %clarify_name,
            retry = %retry_name,
            "clarification flow injected"
        );

        vec![clarify_name, retry_name]
    }

    /// Input for a task: the outputs of its dependencies.
    ///
    /// One dependency passes its output verbatim; several are rendered as
    /// `## <name>` sections in `depends_on` order.
    fn input_for(&self, task: &Task) -> String {
        let deps = task.unique_dependencies();
        match deps.as_slice() {
            [] => String::new(),
            [only] => self.results.get(*only).cloned().unwrap_or_default(),
            many => many
                .iter()
                .map(|dep| {
                    let output = self.results.get(*dep).map(String::as_str).unwrap_or("");
                    format!("## {dep}\n{output}\n")
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn scheduled(&self, id: TaskId) -> ScheduledTask {
        let task = &self.tasks[id.0].task;
        ScheduledTask {
            id,
            task: task.clone(),
            input: self.input_for(task),
        }
    }
}
