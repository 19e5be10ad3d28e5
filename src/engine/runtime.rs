// src/engine/runtime.rs

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::model::Role;
use crate::dag::{ClarificationPolicy, ScheduledTask, Scheduler, TaskGraph};
use crate::errors::{ClampanyError, Result};
use crate::exec::{AiDispatcher, ExecutorBackend, ExecutorRegistry, WorkerPool};
use crate::persist::{ArtifactStore, RunSummary};

use super::core::CoreRuntime;
use super::{CompletionHandle, CoreCommand, CoreStep, RuntimeEvent, RuntimeOptions, TaskName, TaskOutcome};

/// Capacity of the runtime event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives the scheduler in response to `RuntimeEvent`s, and delegates
/// local execution to an `ExecutorBackend` and AI tasks to an `AiDispatcher`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching tasks, and persisting artifacts.
pub struct Runtime<B: ExecutorBackend> {
    core: CoreRuntime,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
    ai: Arc<dyn AiDispatcher>,
    store: ArtifactStore,
    /// Events produced by the shell itself (failed AI hand-offs).
    pending: VecDeque<RuntimeEvent>,
    persistence_errors: BTreeMap<TaskName, String>,
}

impl<B: ExecutorBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Runtime<WorkerPool> {
    /// Runtime backed by a freshly spawned [`WorkerPool`] of
    /// `options.max_parallel` workers. Must be called inside a Tokio runtime.
    pub fn with_worker_pool(
        scheduler: Scheduler,
        options: RuntimeOptions,
        registry: ExecutorRegistry,
        ai: Arc<dyn AiDispatcher>,
        store: ArtifactStore,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);
        let pool = WorkerPool::spawn(options.max_parallel, registry, event_tx.clone());
        let core = CoreRuntime::new(scheduler, options);
        Runtime::new(core, event_tx, event_rx, pool, ai, store)
    }
}

impl<B: ExecutorBackend> Runtime<B> {
    pub fn new(
        core: CoreRuntime,
        event_tx: mpsc::Sender<RuntimeEvent>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        backend: B,
        ai: Arc<dyn AiDispatcher>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            core,
            event_tx,
            event_rx,
            backend,
            ai,
            store,
            pending: VecDeque::new(),
            persistence_errors: BTreeMap::new(),
        }
    }

    /// Handle for reporting AI task results into this runtime.
    pub fn completion_handle(&self) -> CompletionHandle {
        CompletionHandle::new(self.event_tx.clone())
    }

    /// Main event loop.
    ///
    /// - Dispatches the initial ready set.
    /// - Consumes `RuntimeEvent`s and feeds them into the core runtime.
    /// - Executes commands returned by the core.
    /// - Once every task is terminal, waits for the workers and writes the
    ///   run summary.
    ///
    /// Tasks awaiting an external completion keep the loop alive until the
    /// completion arrives.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(run_id = %self.store.run_id(), "clampany runtime started");

        let step = self.core.start();
        let mut keep_running = self.execute_step(step).await?;

        while keep_running {
            let event = match self.pending.pop_front() {
                Some(e) => e,
                None => self.event_rx.recv().await.ok_or_else(|| {
                    ClampanyError::ChannelClosed("runtime event channel".to_string())
                })?,
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = self.execute_step(step).await?;
        }

        // Normally already closed by `CloseQueue`; closing twice is a no-op.
        self.backend.close().await?;

        let summary = RunSummary::from_scheduler(
            self.store.run_id(),
            self.core.scheduler(),
            std::mem::take(&mut self.persistence_errors),
        );
        let path = self.store.write_summary(&summary)?;

        info!(
            status = %summary.status,
            failures = summary.failures.len(),
            skipped = summary.skipped.len(),
            summary = %path.display(),
            "run finished"
        );
        Ok(summary)
    }

    async fn execute_step(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            self.execute_command(command).await?;
        }
        Ok(step.keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchLocal(tasks) => {
                let names: Vec<_> = tasks.iter().map(|t| t.name()).collect();
                debug!(?names, "dispatching ready tasks to workers");
                self.backend.dispatch(tasks).await?;
            }
            CoreCommand::DispatchExternal(tasks) => {
                self.hand_off(tasks).await?;
            }
            CoreCommand::PersistOutput { task, output } => {
                if let Err(err) = self.store.write_output(&task, &output) {
                    warn!(task = %task, error = %err, "failed to persist task output");
                    self.persistence_errors.insert(task, format!("{err:#}"));
                }
            }
            CoreCommand::CloseQueue => {
                self.backend.close().await?;
            }
        }
        Ok(())
    }

    /// Hand AI tasks to the dispatcher on the blocking pool, in order.
    ///
    /// Dispatchers may do file IO; the event loop only waits for the batch
    /// to be handed off, never for the AI result.
    async fn hand_off(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        let ai = Arc::clone(&self.ai);
        let handle = self.completion_handle();

        let rejected = tokio::task::spawn_blocking(move || {
            tasks
                .into_iter()
                .filter_map(|task| match ai.dispatch(&task, &handle) {
                    Ok(()) => None,
                    Err(err) => {
                        error!(task = %task.name(), error = %err, "AI hand-off failed");
                        Some((task.name().to_string(), err.to_string()))
                    }
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ClampanyError::Other(anyhow::anyhow!("AI hand-off panicked: {e}")))?;

        for (task, error) in rejected {
            self.pending.push_back(RuntimeEvent::ExternalCompleted {
                task,
                outcome: TaskOutcome::Failed(error),
            });
        }
        Ok(())
    }
}

/// Execute every task of `graph` once, respecting dependencies, and return
/// the run summary (also written to the store).
///
/// Local tasks run on `options.max_parallel` workers; AI tasks go to `ai` and
/// complete through the runtime's [`CompletionHandle`], which `ai` receives
/// with every dispatch.
pub async fn run_tasks(
    graph: &TaskGraph,
    roles: &[Role],
    registry: ExecutorRegistry,
    ai: Arc<dyn AiDispatcher>,
    store: ArtifactStore,
    options: RuntimeOptions,
    policy: ClarificationPolicy,
) -> Result<RunSummary> {
    let scheduler = Scheduler::new(graph, roles, policy);
    Runtime::with_worker_pool(scheduler, options, registry, ai, store)
        .run()
        .await
}
