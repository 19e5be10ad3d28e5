// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production worker pool in [`pool`](super::pool).

use std::future::Future;
use std::pin::Pin;

use crate::dag::ScheduledTask;
use crate::errors::Result;

/// Trait abstracting how locally executed tasks are run.
///
/// Implementations must report every dispatched task back to the runtime as a
/// `RuntimeEvent::TaskFinished`, exactly once.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// The runtime never dispatches more tasks than there are free workers,
    /// so this should not wait for a worker to become idle.
    fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// No more tasks will be dispatched. Resolves once every worker has
    /// exited. Calling it twice is a no-op.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
