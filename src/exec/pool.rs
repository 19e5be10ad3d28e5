// src/exec/pool.rs

//! Bounded pool of local workers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::{ClampanyError, Result};
use crate::exec::backend::ExecutorBackend;
use crate::exec::executor::ExecutorRegistry;

type SharedQueue = Arc<Mutex<mpsc::Receiver<ScheduledTask>>>;

/// `max_parallel` workers pulling from one dispatch queue.
///
/// Each worker resolves the task's role in the [`ExecutorRegistry`], awaits
/// `execute`, and reports a `TaskFinished` event. Workers exit once the queue
/// is closed and drained.
#[derive(Debug)]
pub struct WorkerPool {
    tx: Option<mpsc::Sender<ScheduledTask>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers. Must be called inside a Tokio runtime.
    pub fn spawn(
        workers: usize,
        registry: ExecutorRegistry,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<ScheduledTask>(workers);
        let queue: SharedQueue = Arc::new(Mutex::new(rx));
        let registry = Arc::new(registry);

        let handles = (0..workers)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let registry = Arc::clone(&registry);
                let runtime_tx = runtime_tx.clone();
                tokio::spawn(worker_loop(id, queue, registry, runtime_tx))
            })
            .collect();

        info!(workers, "worker pool started");

        Self {
            tx: Some(tx),
            workers: handles,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

async fn worker_loop(
    id: usize,
    queue: SharedQueue,
    registry: Arc<ExecutorRegistry>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    debug!(worker = id, "worker started");

    loop {
        // Only one idle worker waits on the queue at a time.
        let next = { queue.lock().await.recv().await };
        let Some(task) = next else {
            break;
        };

        let name = task.name().to_string();
        debug!(worker = id, task = %name, "worker picked up task");

        let outcome = match run_one(&registry, &task).await {
            Ok(output) => TaskOutcome::Success(output),
            Err(err) => {
                error!(task = %name, error = %err, "task execution error");
                TaskOutcome::Failed(err.to_string())
            }
        };

        if runtime_tx
            .send(RuntimeEvent::TaskFinished {
                task: name.clone(),
                outcome,
            })
            .await
            .is_err()
        {
            warn!(worker = id, task = %name, "runtime gone; dropping task result");
            break;
        }
    }

    debug!(worker = id, "worker finished (queue closed)");
}

async fn run_one(registry: &ExecutorRegistry, task: &ScheduledTask) -> Result<String> {
    let executor = registry.get(&task.task.role)?;
    executor.execute(&task.task, &task.input).await
}

impl ExecutorBackend for WorkerPool {
    fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            let Some(tx) = tx else {
                return Err(ClampanyError::ChannelClosed(
                    "dispatch queue already closed".to_string(),
                ));
            };
            for task in tasks {
                tx.send(task).await?;
            }
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Dropping the only sender lets idle workers see the end of the queue.
        self.tx = None;
        let workers = std::mem::take(&mut self.workers);

        Box::pin(async move {
            for handle in workers {
                handle
                    .await
                    .map_err(|e| ClampanyError::Other(anyhow::anyhow!("worker panicked: {e}")))?;
            }
            info!("worker pool stopped");
            Ok(())
        })
    }
}
