// src/exec/ai.rs

//! Hand-off of AI-role tasks to the external AI-session subsystem.
//!
//! AI tasks are never executed by the local worker pool. The runtime passes
//! each one to an [`AiDispatcher`] together with a [`CompletionHandle`]; the
//! task stays `AwaitingExternal` until someone calls
//! [`CompletionHandle::complete`] or [`CompletionHandle::fail`] for it.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::dag::ScheduledTask;
use crate::engine::CompletionHandle;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::persist::output_file_name;

/// Fire-and-forget hand-off for AI tasks.
///
/// `dispatch` must not wait for the result. It runs on Tokio's blocking pool,
/// so blocking file IO is fine. An `Err` means the hand-off itself failed; the
/// runtime then records the task as failed.
pub trait AiDispatcher: Send + Sync + Debug {
    fn dispatch(&self, task: &ScheduledTask, completion: &CompletionHandle) -> Result<()>;
}

/// Strip trailing digits: `planner1` -> `planner`.
///
/// Numbered instances of one role share a queue file.
pub fn role_base(role: &str) -> &str {
    let base = role.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.is_empty() { role } else { base }
}

/// Appends each AI task to `<queue_dir>/<role base>_queue.md`.
///
/// An entry looks like:
///
/// ```text
/// [planner1]
/// <rendered prompt>
/// output: <run_dir>/outputs/<task>.md
///
/// ```
///
/// The `output:` line is only written when an output directory is set; the
/// AI session is expected to write its answer there.
#[derive(Debug, Clone)]
pub struct QueueFileDispatcher {
    fs: Arc<dyn FileSystem>,
    queue_dir: PathBuf,
    output_dir: Option<PathBuf>,
}

impl QueueFileDispatcher {
    pub fn new(fs: Arc<dyn FileSystem>, queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            queue_dir: queue_dir.into(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    pub fn queue_file(&self, role: &str) -> PathBuf {
        self.queue_dir.join(format!("{}_queue.md", role_base(role)))
    }

    fn entry(&self, task: &ScheduledTask) -> String {
        let mut entry = format!(
            "[{}]\n{}\n",
            task.task.role,
            task.task.render_prompt(&task.input)
        );
        if let Some(dir) = &self.output_dir {
            entry.push_str(&format!(
                "output: {}\n",
                dir.join(output_file_name(task.name())).display()
            ));
        }
        entry.push('\n');
        entry
    }
}

impl AiDispatcher for QueueFileDispatcher {
    fn dispatch(&self, task: &ScheduledTask, _completion: &CompletionHandle) -> Result<()> {
        let path = self.queue_file(&task.task.role);
        self.fs.append(&path, self.entry(task).as_bytes())?;

        info!(
            task = %task.name(),
            role = %task.task.role,
            queue = %path.display(),
            "AI task queued"
        );
        Ok(())
    }
}
