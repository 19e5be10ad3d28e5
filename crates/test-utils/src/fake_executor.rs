use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use clampany::config::Task;
use clampany::dag::ScheduledTask;
use clampany::engine::{CompletionHandle, RuntimeEvent, TaskOutcome};
use clampany::errors::{ClampanyError, Result};
use clampany::exec::{AiDispatcher, Executor, ExecutorBackend};

/// What a fake should answer for a task.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(String),
    Fail(String),
}

impl Reply {
    fn outcome(&self) -> TaskOutcome {
        match self {
            Reply::Output(text) => TaskOutcome::Success(text.clone()),
            Reply::Fail(err) => TaskOutcome::Failed(err.clone()),
        }
    }
}

/// A fake `Executor` that:
/// - records which tasks were run, and the input each one received
/// - answers from a script, defaulting to `"<name> done"`
/// - tracks how many executions overlapped
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    replies: HashMap<String, Reply>,
    delay: Duration,
    executed: Mutex<Vec<String>>,
    inputs: Mutex<HashMap<String, String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, task: &str, output: &str) -> Self {
        self.replies
            .insert(task.to_string(), Reply::Output(output.to_string()));
        self
    }

    pub fn fail(mut self, task: &str, error: &str) -> Self {
        self.replies
            .insert(task.to_string(), Reply::Fail(error.to_string()));
        self
    }

    /// Every execution sleeps this long before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn input_of(&self, task: &str) -> Option<String> {
        self.inputs.lock().unwrap().get(task).cloned()
    }

    /// Highest number of executions that were in progress at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn run(&self, task: &Task, input: &str) -> Result<String> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        self.executed.lock().unwrap().push(task.name.clone());
        self.inputs
            .lock()
            .unwrap()
            .insert(task.name.clone(), input.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);

        match self.replies.get(&task.name) {
            Some(Reply::Output(text)) => Ok(text.clone()),
            Some(Reply::Fail(err)) => Err(ClampanyError::Other(anyhow::anyhow!(err.clone()))),
            None => Ok(format!("{} done", task.name)),
        }
    }
}

impl Executor for ScriptedExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.run(task, input))
    }
}

/// A fake `ExecutorBackend` that:
/// - records which tasks were dispatched
/// - immediately reports `TaskFinished(Success)` for each one.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            closed,
        }
    }
}

impl ExecutorBackend for FakeBackend {
    fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for t in tasks {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(t.name().to_string());
                }

                tx.send(RuntimeEvent::TaskFinished {
                    task: t.name().to_string(),
                    outcome: TaskOutcome::Success(format!("{} done", t.name())),
                })
                .await?;
            }
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

/// A fake `AiDispatcher` that records hand-offs and, optionally, answers
/// them right away through the completion handle.
#[derive(Debug, Default)]
pub struct RecordingAiDispatcher {
    dispatched: Mutex<Vec<ScheduledTask>>,
    replies: HashMap<String, Reply>,
    auto_complete: bool,
    reject: bool,
    pause: Option<Duration>,
}

impl RecordingAiDispatcher {
    /// Records only; completions must be sent by the test.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes every task with its scripted reply, or `"<name> answer"`.
    pub fn auto_complete() -> Self {
        Self {
            auto_complete: true,
            ..Self::default()
        }
    }

    /// Every hand-off fails.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn reply(mut self, task: &str, output: &str) -> Self {
        self.replies
            .insert(task.to_string(), Reply::Output(output.to_string()));
        self
    }

    pub fn fail(mut self, task: &str, error: &str) -> Self {
        self.replies
            .insert(task.to_string(), Reply::Fail(error.to_string()));
        self
    }

    /// Block the calling thread this long in every `dispatch`.
    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = Some(pause);
        self
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub fn dispatched_task(&self, name: &str) -> Option<ScheduledTask> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }
}

impl AiDispatcher for RecordingAiDispatcher {
    fn dispatch(&self, task: &ScheduledTask, completion: &CompletionHandle) -> Result<()> {
        if let Some(pause) = self.pause {
            std::thread::sleep(pause);
        }
        self.dispatched.lock().unwrap().push(task.clone());

        if self.reject {
            return Err(ClampanyError::Other(anyhow::anyhow!(
                "AI session for '{}' unavailable",
                task.task.role
            )));
        }

        if self.auto_complete {
            let name = task.name().to_string();
            let reply = self
                .replies
                .get(&name)
                .cloned()
                .unwrap_or_else(|| Reply::Output(format!("{name} answer")));
            let completion = completion.clone();

            tokio::spawn(async move {
                let _ = match reply.outcome() {
                    TaskOutcome::Success(output) => completion.complete(name, output).await,
                    TaskOutcome::Failed(err) => completion.fail(name, err).await,
                };
            });
        }

        Ok(())
    }
}
